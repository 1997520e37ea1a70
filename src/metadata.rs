//! Clip metadata types.
//!
//! Returned by [`ClipProbe::probe`](crate::ClipProbe::probe). Metadata is an
//! engine-neutral, owned snapshot of the container's streams.

use crate::engine::{MediaType, StreamParameters};

/// Metadata for an encoded clip.
///
/// # Example
///
/// ```no_run
/// use framebridge::{ClipProbe, FfmpegEngine};
///
/// let bytes = std::fs::read("clip.mp4")?;
/// let metadata = ClipProbe::probe(&FfmpegEngine::new(), &bytes)?;
/// if let Some(video) = metadata.video() {
///     println!("{}x{}, {} frames", video.width, video.height, video.declared_frames);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ClipMetadata {
    /// Every stream of the container, in container order.
    pub streams: Vec<StreamMetadata>,
}

impl ClipMetadata {
    /// The first video stream, if any.
    pub fn video(&self) -> Option<&StreamMetadata> {
        self.streams
            .iter()
            .find(|stream| stream.media_type == MediaType::Video)
    }

    pub fn video_stream_count(&self) -> usize {
        self.streams
            .iter()
            .filter(|stream| stream.media_type == MediaType::Video)
            .count()
    }
}

/// Metadata for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct StreamMetadata {
    /// Index of the stream inside the container.
    pub index: usize,
    pub media_type: MediaType,
    /// Codec name (e.g. `"h264"`, `"mjpeg"`).
    pub codec: String,
    /// Frame width in pixels; zero for non-video streams.
    pub width: u32,
    /// Frame height in pixels; zero for non-video streams.
    pub height: u32,
    /// Frame count declared by the container, zero when unknown.
    pub declared_frames: u64,
}

impl<C> From<&StreamParameters<C>> for StreamMetadata {
    fn from(parameters: &StreamParameters<C>) -> Self {
        StreamMetadata {
            index: parameters.index,
            media_type: parameters.media_type,
            codec: parameters.codec_name.clone(),
            width: parameters.width,
            height: parameters.height,
            declared_frames: declared_frame_count(parameters.declared_frames),
        }
    }
}

/// Clamp a container's declared frame count to the unsigned hint used by
/// the decode context; negative counts mean unknown.
pub(crate) fn declared_frame_count(declared: i64) -> u64 {
    u64::try_from(declared).unwrap_or(0)
}
