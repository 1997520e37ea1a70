//! The FFmpeg codec engine.
//!
//! [`FfmpegEngine`] implements [`CodecEngine`] on top of `ffmpeg-next`. Input
//! containers are read straight from memory through a custom I/O context
//! ([`MemoryInput`]); decoding and RGB conversion use FFmpeg's own decoder
//! and `swscale` contexts.

mod decoder;
mod log_level;
mod memory_input;
mod scaler;

use ffmpeg_next::{
    Codec, Packet, codec::Id as CodecId, format::Pixel, frame::Video as VideoFrame,
    packet::Mut as _,
    util::error::EAGAIN,
};
use ffmpeg_sys_next::{av_frame_unref, av_packet_unref};

pub use decoder::FfmpegDecoder;
pub use log_level::{EngineLogLevel, engine_log_level, set_engine_log_level};
pub use memory_input::MemoryInput;
pub use scaler::FfmpegScaler;

use crate::{
    config::ScalingAlgorithm,
    engine::{CodecEngine, FrameBuffer, NativeError, NativeResult, PacketBuffer, StreamParameters},
};

impl From<ffmpeg_next::Error> for NativeError {
    fn from(error: ffmpeg_next::Error) -> Self {
        let code = i32::from(error);
        match error {
            ffmpeg_next::Error::Eof => NativeError::end_of_stream(code),
            ffmpeg_next::Error::Other { errno } if errno == EAGAIN => NativeError::try_again(code),
            _ => NativeError::failure(code),
        }
    }
}

/// The production codec engine, backed by FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> Self {
        FfmpegEngine
    }
}

impl CodecEngine for FfmpegEngine {
    type Demuxer<'a> = MemoryInput<'a>;
    type CodecId = CodecId;
    type Codec = Codec;
    type PixelFormat = Pixel;
    type Decoder = FfmpegDecoder;
    type Scaler = FfmpegScaler;
    type Packet = Packet;
    type Frame = VideoFrame;

    fn open_input<'a>(&'a self, data: &'a [u8]) -> NativeResult<MemoryInput<'a>> {
        MemoryInput::open(data)
    }

    fn find_decoder(&self, stream: &StreamParameters<CodecId>) -> NativeResult<Codec> {
        ffmpeg_next::decoder::find(stream.codec).ok_or_else(|| {
            log::debug!("No decoder for codec {:?} (stream {})", stream.codec, stream.index);
            ffmpeg_next::Error::DecoderNotFound.into()
        })
    }

    fn open_decoder(
        &self,
        codec: Codec,
        demuxer: &MemoryInput<'_>,
        stream_index: usize,
    ) -> NativeResult<FfmpegDecoder> {
        FfmpegDecoder::open(codec, demuxer, stream_index)
    }

    fn scaler(
        &self,
        format: Pixel,
        width: u32,
        height: u32,
        algorithm: ScalingAlgorithm,
    ) -> NativeResult<FfmpegScaler> {
        FfmpegScaler::new(format, width, height, algorithm)
    }

    fn new_packet(&self) -> Packet {
        Packet::empty()
    }

    fn new_frame(&self) -> VideoFrame {
        VideoFrame::empty()
    }
}

impl PacketBuffer for Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }

    fn clear(&mut self) {
        // SAFETY: the packet pointer is valid for the packet's lifetime.
        unsafe { av_packet_unref(self.as_mut_ptr()) };
    }
}

impl FrameBuffer for VideoFrame {
    fn clear(&mut self) {
        // SAFETY: the frame pointer is valid for the frame's lifetime.
        unsafe { av_frame_unref(self.as_mut_ptr()) };
    }
}
