//! FFmpeg video decoder.

use ffmpeg_next::{
    Codec, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
};

use crate::engine::{Decoder, NativeError, NativeResult};

use super::{FfmpegEngine, memory_input::MemoryInput};

/// An opened video decoder.
pub struct FfmpegDecoder {
    decoder: VideoDecoder,
}

// SAFETY: the codec context is only reached through `&mut self`, and FFmpeg
// codec contexts may move between threads while not in use.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    /// Open `codec` with the parameters of stream `stream_index` of `input`.
    pub(crate) fn open(
        codec: Codec,
        input: &MemoryInput<'_>,
        stream_index: usize,
    ) -> NativeResult<Self> {
        let stream = input.input()?.stream(stream_index).ok_or_else(|| {
            NativeError::failure(i32::from(ffmpeg_next::Error::StreamNotFound))
        })?;
        let codec_name = codec.name().to_string();
        let codec_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = codec_context.decoder().open_as(codec)?.video()?;

        log::debug!(
            "Opened {} decoder for stream {} ({:?}, {}x{})",
            codec_name,
            stream_index,
            decoder.format(),
            decoder.width(),
            decoder.height(),
        );

        Ok(Self { decoder })
    }
}

impl Decoder<FfmpegEngine> for FfmpegDecoder {
    fn pixel_format(&self) -> Pixel {
        self.decoder.format()
    }

    fn send_packet(&mut self, packet: &Packet) -> NativeResult<()> {
        self.decoder.send_packet(packet)?;
        Ok(())
    }

    fn send_eof(&mut self) -> NativeResult<()> {
        self.decoder.send_eof()?;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut VideoFrame) -> NativeResult<()> {
        self.decoder.receive_frame(frame)?;
        Ok(())
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }
}
