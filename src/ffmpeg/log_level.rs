//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr, independently of the `log`
//! facade this crate uses. These functions tune that output without
//! importing `ffmpeg-next` directly.
//!
//! ```no_run
//! use framebridge::EngineLogLevel;
//!
//! framebridge::set_engine_log_level(EngineLogLevel::Error);
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use ffmpeg_next::util::log::Level;

/// FFmpeg log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineLogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    /// FFmpeg's default.
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl EngineLogLevel {
    const NAMES: [(&'static str, EngineLogLevel); 9] = [
        ("quiet", EngineLogLevel::Quiet),
        ("panic", EngineLogLevel::Panic),
        ("fatal", EngineLogLevel::Fatal),
        ("error", EngineLogLevel::Error),
        ("warning", EngineLogLevel::Warning),
        ("info", EngineLogLevel::Info),
        ("verbose", EngineLogLevel::Verbose),
        ("debug", EngineLogLevel::Debug),
        ("trace", EngineLogLevel::Trace),
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, level)| *level == self)
            .map_or("warning", |(name, _)| name)
    }

    fn to_level(self) -> Level {
        match self {
            EngineLogLevel::Quiet => Level::Quiet,
            EngineLogLevel::Panic => Level::Panic,
            EngineLogLevel::Fatal => Level::Fatal,
            EngineLogLevel::Error => Level::Error,
            EngineLogLevel::Warning => Level::Warning,
            EngineLogLevel::Info => Level::Info,
            EngineLogLevel::Verbose => Level::Verbose,
            EngineLogLevel::Debug => Level::Debug,
            EngineLogLevel::Trace => Level::Trace,
        }
    }

    fn from_level(level: Level) -> Self {
        match level {
            Level::Quiet => EngineLogLevel::Quiet,
            Level::Panic => EngineLogLevel::Panic,
            Level::Fatal => EngineLogLevel::Fatal,
            Level::Error => EngineLogLevel::Error,
            Level::Warning => EngineLogLevel::Warning,
            Level::Info => EngineLogLevel::Info,
            Level::Verbose => EngineLogLevel::Verbose,
            Level::Debug => EngineLogLevel::Debug,
            Level::Trace => EngineLogLevel::Trace,
        }
    }
}

impl Display for EngineLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for EngineLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| format!("unknown log level '{value}'"))
    }
}

/// Set FFmpeg's console verbosity.
pub fn set_engine_log_level(level: EngineLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_level());
}

/// FFmpeg's current console verbosity, if it maps to a known level.
pub fn engine_log_level() -> Option<EngineLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(EngineLogLevel::from_level)
}
