//! FFmpeg pixel-format conversion to RGB24.

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    config::ScalingAlgorithm,
    engine::{NativeError, NativeResult, Scaler},
};

use super::FfmpegEngine;

const BYTES_PER_PIXEL: usize = 3;

/// Converts decoded frames to tightly packed RGB24 at the source size.
pub struct FfmpegScaler {
    context: ScalingContext,
    rgb_frame: VideoFrame,
    width: u32,
    height: u32,
}

// SAFETY: the scaling context and its output frame are owned exclusively
// and only used through `&mut self`.
unsafe impl Send for FfmpegScaler {}

impl FfmpegScaler {
    pub(crate) fn new(
        format: Pixel,
        width: u32,
        height: u32,
        algorithm: ScalingAlgorithm,
    ) -> NativeResult<Self> {
        let context = ScalingContext::get(
            format,
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling_flags(algorithm),
        )?;

        Ok(Self {
            context,
            rgb_frame: VideoFrame::empty(),
            width,
            height,
        })
    }
}

impl Scaler<FfmpegEngine> for FfmpegScaler {
    fn scale(&mut self, frame: &VideoFrame, destination: &mut [u8]) -> NativeResult<()> {
        self.context.run(frame, &mut self.rgb_frame)?;

        let row_length = self.width as usize * BYTES_PER_PIXEL;
        let rows = self.height as usize;
        if destination.len() != row_length * rows {
            return Err(NativeError::failure(i32::from(
                ffmpeg_next::Error::InvalidData,
            )));
        }

        // The converter pads rows to its own alignment.
        let stride = self.rgb_frame.stride(0);
        let data = self.rgb_frame.data(0);
        if stride == row_length {
            destination.copy_from_slice(&data[..row_length * rows]);
        } else {
            for (row, chunk) in destination.chunks_exact_mut(row_length).enumerate() {
                let start = row * stride;
                chunk.copy_from_slice(&data[start..start + row_length]);
            }
        }
        Ok(())
    }
}

fn scaling_flags(algorithm: ScalingAlgorithm) -> ScalingFlags {
    match algorithm {
        ScalingAlgorithm::FastBilinear => ScalingFlags::FAST_BILINEAR,
        ScalingAlgorithm::Bilinear => ScalingFlags::BILINEAR,
        ScalingAlgorithm::Bicubic => ScalingFlags::BICUBIC,
        ScalingAlgorithm::Point => ScalingFlags::POINT,
        ScalingAlgorithm::Area => ScalingFlags::AREA,
    }
}
