//! Decode configuration.
//!
//! [`DecodeOptions`] is a builder that controls which stream a
//! [`DecodeContext`](crate::DecodeContext) decodes, how frames are pulled out
//! of the decoder, and which scaling algorithm converts them to RGB.
//!
//! # Example
//!
//! ```no_run
//! use framebridge::{DecodeOptions, RetrievalMode, ScalingAlgorithm, StreamSelection};
//!
//! let options = DecodeOptions::new()
//!     .with_stream_selection(StreamSelection::Index(0))
//!     .with_retrieval_mode(RetrievalMode::Single)
//!     .with_scaling(ScalingAlgorithm::Bicubic);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::engine::{MediaType, StreamParameters};

/// Which container stream a context decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSelection {
    /// The first stream whose media type is video. This is the default.
    #[default]
    FirstVideo,
    /// A fixed stream index, regardless of its media type.
    Index(usize),
}

impl StreamSelection {
    /// Pick a stream from `streams`, if one matches.
    pub(crate) fn select<'s, C>(
        self,
        streams: &'s [StreamParameters<C>],
    ) -> Option<&'s StreamParameters<C>> {
        match self {
            StreamSelection::FirstVideo => streams
                .iter()
                .find(|stream| stream.media_type == MediaType::Video),
            StreamSelection::Index(index) => streams.iter().find(|stream| stream.index == index),
        }
    }
}

/// How decoded frames are pulled out of the decoder per submitted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Retrieve frames until the decoder asks for more input, and flush the
    /// decoder at end of stream. This is the default.
    #[default]
    Drain,
    /// Retrieve exactly one frame per packet. A decoder that needs more
    /// input fails the call with a retrieval error.
    Single,
}

/// Scaling algorithm used for the conversion to RGB24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingAlgorithm {
    FastBilinear,
    /// Bilinear interpolation. This is the default.
    #[default]
    Bilinear,
    Bicubic,
    Point,
    Area,
}

/// Options for building and driving a decode context.
///
/// All fields have defaults; a default-constructed value decodes the first
/// video stream, drains the decoder after every packet, and scales bilinearly.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub(crate) stream_selection: StreamSelection,
    pub(crate) retrieval_mode: RetrievalMode,
    pub(crate) scaling: ScalingAlgorithm,
}

impl Debug for DecodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodeOptions")
            .field("stream_selection", &self.stream_selection)
            .field("retrieval_mode", &self.retrieval_mode)
            .field("scaling", &self.scaling)
            .finish()
    }
}

impl DecodeOptions {
    /// Create options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose which stream to decode.
    #[must_use]
    pub fn with_stream_selection(mut self, selection: StreamSelection) -> Self {
        self.stream_selection = selection;
        self
    }

    /// Choose how frames are retrieved from the decoder.
    #[must_use]
    pub fn with_retrieval_mode(mut self, mode: RetrievalMode) -> Self {
        self.retrieval_mode = mode;
        self
    }

    /// Choose the RGB conversion algorithm.
    #[must_use]
    pub fn with_scaling(mut self, algorithm: ScalingAlgorithm) -> Self {
        self.scaling = algorithm;
        self
    }

    pub fn stream_selection(&self) -> StreamSelection {
        self.stream_selection
    }

    pub fn retrieval_mode(&self) -> RetrievalMode {
        self.retrieval_mode
    }

    pub fn scaling(&self) -> ScalingAlgorithm {
        self.scaling
    }
}
