//! Error types for the `framebridge` crate.
//!
//! [`DecodingError`] is the single error type returned by every fallible
//! operation. Failures reported by the codec engine carry the [`Step`] that
//! failed and the engine's numeric code, and render as
//! `"<Step> failed, error code: <n>"`.

use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

use crate::engine::NativeError;

/// The pipeline step a native failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Opening the container from the in-memory buffer.
    Demuxing,
    /// Reading stream parameters from the opened container.
    StreamInfo,
    /// Choosing the video stream to decode.
    StreamSelection,
    /// Finding a decoder for the stream's codec.
    DecoderLookup,
    /// Opening the decoding context.
    DecoderOpen,
    /// Building the pixel-format converter.
    ScalerInit,
    /// Extracting the next encoded packet.
    PacketRead,
    /// Submitting a packet to the decoder.
    PacketSubmit,
    /// Retrieving a decoded frame from the decoder.
    FrameRetrieve,
    /// Converting a decoded frame to RGB24.
    Scaling,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Step::Demuxing => "Demuxing",
            Step::StreamInfo => "Stream info retrieval",
            Step::StreamSelection => "Stream selection",
            Step::DecoderLookup => "Decoder lookup",
            Step::DecoderOpen => "Decoder initialization",
            Step::ScalerInit => "Scaler initialization",
            Step::PacketRead => "Packet read",
            Step::PacketSubmit => "Packet submission",
            Step::FrameRetrieve => "Frame retrieval",
            Step::Scaling => "Frame scaling",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`DecodingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An unknown context-type tag was passed at the handle boundary.
    UnsupportedContext,
    /// Building a decode context failed.
    InitializationFailure,
    /// Reading the container failed or ended early.
    DemuxFailure,
    /// The decoder or scaler rejected a packet or frame.
    DecodeFailure,
    /// The stream does not declare a frame count.
    UnknownFrameRate,
    /// The host side (image adapter, handle, service) failed.
    Host,
}

/// The unified error type for all `framebridge` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodingError {
    /// The context-type tag is not implemented.
    #[error("Context {0} is not supported")]
    UnsupportedContext(i32),

    /// A step of context construction failed.
    #[error("{step} failed, error code: {code}", code = .source.code())]
    InitializationFailure {
        /// The step that failed.
        step: Step,
        /// The engine's error.
        source: NativeError,
    },

    /// Probing or reading the container failed during decoding.
    #[error("{step} failed, error code: {code}", code = .source.code())]
    DemuxFailure {
        /// The step that failed.
        step: Step,
        /// The engine's error.
        source: NativeError,
    },

    /// Submitting, retrieving, or scaling a frame failed.
    #[error("{step} failed, error code: {code}", code = .source.code())]
    DecodeFailure {
        /// The step that failed.
        step: Step,
        /// The engine's error.
        source: NativeError,
    },

    /// The stream's declared frame count is zero.
    #[error("Unknown frame rate")]
    UnknownFrameRate,

    /// The re-probed stream no longer matches the context's dimensions.
    #[error(
        "Stream dimensions changed: context is {expected_width}x{expected_height}, input is {width}x{height}"
    )]
    IncompatibleStream {
        /// Width the context was built for.
        expected_width: u32,
        /// Height the context was built for.
        expected_height: u32,
        /// Width found in the input.
        width: u32,
        /// Height found in the input.
        height: u32,
    },

    /// The image adapter could not build a host image.
    #[error("Image conversion failed: {0}")]
    ImageConversion(String),

    /// A null handle was passed at the handle boundary.
    #[error("Context handle is null")]
    NullHandle,

    /// The stream context has already been closed.
    #[error("Stream context is closed")]
    ContextClosed,

    /// The job was discarded by a purge before it ran.
    #[error("Decoding job was purged")]
    Purged,

    /// The job panicked; the payload message is kept when it is a string.
    #[error("Decoding job panicked: {0}")]
    JobPanicked(String),
}

impl DecodingError {
    pub(crate) fn initialization(step: Step, source: NativeError) -> Self {
        DecodingError::InitializationFailure { step, source }
    }

    pub(crate) fn demux(step: Step, source: NativeError) -> Self {
        DecodingError::DemuxFailure { step, source }
    }

    pub(crate) fn decode(step: Step, source: NativeError) -> Self {
        DecodingError::DecodeFailure { step, source }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodingError::UnsupportedContext(_) => ErrorKind::UnsupportedContext,
            DecodingError::InitializationFailure { .. } => ErrorKind::InitializationFailure,
            DecodingError::DemuxFailure { .. } | DecodingError::IncompatibleStream { .. } => {
                ErrorKind::DemuxFailure
            }
            DecodingError::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            DecodingError::UnknownFrameRate => ErrorKind::UnknownFrameRate,
            DecodingError::ImageConversion(_)
            | DecodingError::NullHandle
            | DecodingError::ContextClosed
            | DecodingError::Purged
            | DecodingError::JobPanicked(_) => ErrorKind::Host,
        }
    }

    /// The failing step, for native failures.
    pub fn step(&self) -> Option<Step> {
        match self {
            DecodingError::InitializationFailure { step, .. }
            | DecodingError::DemuxFailure { step, .. }
            | DecodingError::DecodeFailure { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The engine's numeric error code, for native failures.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            DecodingError::InitializationFailure { source, .. }
            | DecodingError::DemuxFailure { source, .. }
            | DecodingError::DecodeFailure { source, .. } => Some(source.code()),
            _ => None,
        }
    }
}
