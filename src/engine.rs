//! The codec-engine contract.
//!
//! The decode core never talks to FFmpeg directly. It drives a
//! [`CodecEngine`] through a narrow set of operations: open a container over
//! an in-memory buffer, list its streams, find and open a decoder, build an
//! RGB24 scaler, read packets, and submit/retrieve frames. Every operation
//! can fail with a [`NativeError`] whose numeric code is propagated to the
//! caller untouched.
//!
//! [`FfmpegEngine`](crate::FfmpegEngine) is the production implementation.

use std::fmt::Debug;

use thiserror::Error;

use crate::config::ScalingAlgorithm;

/// How the engine classified a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    /// The decoder needs more input before it can produce output.
    TryAgain,
    /// The input or the decoder has no more data.
    EndOfStream,
    /// Any other failure.
    Failure,
}

/// A failure reported by the codec engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("native error code {code}")]
pub struct NativeError {
    code: i32,
    kind: NativeErrorKind,
}

impl NativeError {
    /// A generic failure with the given code.
    pub const fn failure(code: i32) -> Self {
        Self {
            code,
            kind: NativeErrorKind::Failure,
        }
    }

    /// A "needs more input" condition with the given code.
    pub const fn try_again(code: i32) -> Self {
        Self {
            code,
            kind: NativeErrorKind::TryAgain,
        }
    }

    /// An end-of-stream condition with the given code.
    pub const fn end_of_stream(code: i32) -> Self {
        Self {
            code,
            kind: NativeErrorKind::EndOfStream,
        }
    }

    /// The engine's numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// How the engine classified the failure.
    pub fn kind(&self) -> NativeErrorKind {
        self.kind
    }

    pub fn is_try_again(&self) -> bool {
        self.kind == NativeErrorKind::TryAgain
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.kind == NativeErrorKind::EndOfStream
    }
}

/// Result alias for engine operations.
pub type NativeResult<T> = Result<T, NativeError>;

/// Media type of a container stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Other,
}

/// Parameters of one container stream as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParameters<C> {
    /// Index of the stream inside the container.
    pub index: usize,
    /// What kind of data the stream carries.
    pub media_type: MediaType,
    /// Engine-specific codec identifier.
    pub codec: C,
    /// Human-readable codec name.
    pub codec_name: String,
    /// Frame width in pixels (zero for non-video streams).
    pub width: u32,
    /// Frame height in pixels (zero for non-video streams).
    pub height: u32,
    /// Frame count declared by the container; zero or negative when unknown.
    pub declared_frames: i64,
}

/// A reusable encoded-packet buffer.
pub trait PacketBuffer {
    /// Index of the stream the currently held packet belongs to.
    fn stream_index(&self) -> usize;

    /// Drop the packet's payload reference, keeping the buffer itself.
    fn clear(&mut self);
}

/// A reusable decoded-frame buffer.
pub trait FrameBuffer {
    /// Drop the frame's data references, keeping the buffer itself.
    fn clear(&mut self);
}

/// A call-scoped demux handle over an in-memory buffer.
pub trait Demuxer<E: CodecEngine + ?Sized> {
    /// Read stream parameters (codec, dimensions, frame counts).
    fn load_stream_info(&mut self) -> NativeResult<()>;

    /// All streams of the container, in container order.
    fn streams(&self) -> Vec<StreamParameters<E::CodecId>>;

    /// Fill `packet` with the next encoded unit.
    fn read_packet(&mut self, packet: &mut E::Packet) -> NativeResult<()>;
}

/// An open decoding context.
pub trait Decoder<E: CodecEngine + ?Sized> {
    /// The pixel format the decoder produces.
    fn pixel_format(&self) -> E::PixelFormat;

    /// Submit one encoded packet.
    fn send_packet(&mut self, packet: &E::Packet) -> NativeResult<()>;

    /// Signal that no more packets follow, so buffered frames can drain.
    fn send_eof(&mut self) -> NativeResult<()>;

    /// Retrieve one decoded frame into `frame`.
    ///
    /// Fails with a [`NativeErrorKind::TryAgain`] error when more input is
    /// needed and with [`NativeErrorKind::EndOfStream`] once fully drained.
    fn receive_frame(&mut self, frame: &mut E::Frame) -> NativeResult<()>;

    /// Discard all buffered state so decoding can restart from a keyframe.
    fn flush(&mut self);
}

/// A pixel-format converter to tightly packed RGB24.
pub trait Scaler<E: CodecEngine + ?Sized> {
    /// Convert `frame` into `destination`, which holds exactly
    /// `width * height * 3` bytes with a row stride of `width * 3`.
    fn scale(&mut self, frame: &E::Frame, destination: &mut [u8]) -> NativeResult<()>;
}

/// The codec engine collaborator.
pub trait CodecEngine {
    /// Demux handle borrowing the encoded bytes.
    type Demuxer<'a>: Demuxer<Self>
    where
        Self: 'a;
    /// Codec identifier stored in [`StreamParameters`].
    type CodecId: Clone + Debug;
    /// A located (not yet opened) decoder implementation.
    type Codec;
    /// Native pixel format identifier.
    type PixelFormat: Copy + Debug;
    type Decoder: Decoder<Self>;
    type Scaler: Scaler<Self>;
    type Packet: PacketBuffer;
    type Frame: FrameBuffer;

    /// Open a container over `data`.
    fn open_input<'a>(&'a self, data: &'a [u8]) -> NativeResult<Self::Demuxer<'a>>;

    /// Locate a decoder for `stream`'s codec.
    fn find_decoder(&self, stream: &StreamParameters<Self::CodecId>) -> NativeResult<Self::Codec>;

    /// Open `codec` with the parameters of stream `stream_index`.
    fn open_decoder(
        &self,
        codec: Self::Codec,
        demuxer: &Self::Demuxer<'_>,
        stream_index: usize,
    ) -> NativeResult<Self::Decoder>;

    /// Build a converter from `format` at `width`×`height` to RGB24 at the
    /// same size.
    fn scaler(
        &self,
        format: Self::PixelFormat,
        width: u32,
        height: u32,
        algorithm: ScalingAlgorithm,
    ) -> NativeResult<Self::Scaler>;

    fn new_packet(&self) -> Self::Packet;

    fn new_frame(&self) -> Self::Frame;
}
