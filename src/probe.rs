//! Container probing over in-memory buffers.
//!
//! [`open_probed`] is the probe step shared by context construction and
//! every decode call: it opens the container through the engine and loads
//! stream information. [`ClipProbe`] exposes the same step publicly for
//! inspecting a clip without building a decode context.

use crate::{
    engine::{CodecEngine, Demuxer, NativeError},
    error::{DecodingError, Step},
    metadata::{ClipMetadata, StreamMetadata},
};

/// Open a demux handle over `data` with stream information loaded.
///
/// On failure the step that failed is returned alongside the engine error;
/// any partially opened handle has already been released.
pub(crate) fn open_probed<'a, E: CodecEngine>(
    engine: &'a E,
    data: &'a [u8],
) -> Result<E::Demuxer<'a>, (Step, NativeError)> {
    let mut demuxer = engine
        .open_input(data)
        .map_err(|error| (Step::Demuxing, error))?;
    demuxer
        .load_stream_info()
        .map_err(|error| (Step::StreamInfo, error))?;
    Ok(demuxer)
}

/// Lightweight clip probe.
///
/// Opens the container, snapshots its stream metadata, and releases the
/// demux handle before returning.
///
/// # Example
///
/// ```no_run
/// use framebridge::{ClipProbe, FfmpegEngine};
///
/// let bytes = std::fs::read("clip.mp4")?;
/// let metadata = ClipProbe::probe(&FfmpegEngine::new(), &bytes)?;
/// println!("{} streams", metadata.streams.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ClipProbe;

impl ClipProbe {
    /// Probe `data` and return its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError::InitializationFailure`] when the container
    /// cannot be opened or its stream information cannot be read.
    pub fn probe<E: CodecEngine>(engine: &E, data: &[u8]) -> Result<ClipMetadata, DecodingError> {
        let demuxer = open_probed(engine, data)
            .map_err(|(step, error)| DecodingError::initialization(step, error))?;
        let streams = demuxer
            .streams()
            .iter()
            .map(StreamMetadata::from)
            .collect();
        Ok(ClipMetadata { streams })
    }
}
