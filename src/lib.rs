//! # framebridge
//!
//! Decode frames from in-memory video clips into packed-pixel host images.
//!
//! `framebridge` keeps a long-lived [`DecodeContext`] per clip: the decoder,
//! an RGB24 converter and reusable buffers are built once, and every call to
//! [`DecodeContext::decode_frames`] pulls the next batch of frames out of the
//! encoded bytes. Frames come back as `0x00RRGGBB` pixels wrapped by an
//! [`ImageAdapter`] of your choice. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framebridge::{DecodeContext, DecodeOptions, FfmpegEngine, PackedImageAdapter};
//!
//! let bytes = std::fs::read("clip.mp4")?;
//! let mut context = DecodeContext::open(FfmpegEngine::new(), &bytes, DecodeOptions::new())?;
//!
//! // The first ten frames.
//! let images = context.decode_frames(&bytes, 0, 10, &PackedImageAdapter)?;
//! println!("{}x{}", images[0].width(), images[0].height());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Layers
//!
//! - [`DecodeContext`]: the owned decode state and its decode loop.
//! - [`handle`]: the same operations over an opaque 64-bit handle for hosts
//!   that cannot hold Rust values.
//! - [`FrameDecoder`]: a background worker that runs context initialization
//!   and decode jobs, with polling and blocking result retrieval.
//! - [`ClipProbe`]: stream metadata without building a context.
//!
//! The codec engine sits behind the [`CodecEngine`] trait family;
//! [`FfmpegEngine`] is the production implementation.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod adapter;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod handle;
pub mod metadata;
pub mod pixel;
pub mod probe;
pub mod service;

pub use adapter::{DynamicImageAdapter, ImageAdapter, PackedImage, PackedImageAdapter};
pub use config::{DecodeOptions, RetrievalMode, ScalingAlgorithm, StreamSelection};
pub use context::{DecodeContext, RawHandle};
pub use engine::{CodecEngine, MediaType, NativeError, NativeErrorKind, StreamParameters};
pub use error::{DecodingError, ErrorKind, Step};
pub use ffmpeg::{EngineLogLevel, FfmpegEngine, engine_log_level, set_engine_log_level};
pub use handle::ContextType;
pub use metadata::{ClipMetadata, StreamMetadata};
pub use pixel::PixelLayout;
pub use probe::ClipProbe;
pub use service::{DecodedFrames, FrameDecoder, StreamContext};
