//! Packed-pixel conversion.
//!
//! Scaled frames arrive as tightly packed RGB24 bytes. Hosts consume them as
//! one `u32` per pixel laid out as `0x00RRGGBB`, described by
//! [`PixelLayout::RGB24_PACKED`].

/// Bit layout of a packed 32-bit pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelLayout {
    /// Number of significant bits per pixel.
    pub bits: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl PixelLayout {
    /// 24-bit RGB in the low three bytes, no alpha.
    pub const RGB24_PACKED: PixelLayout = PixelLayout {
        bits: 24,
        red_mask: 0x00ff_0000,
        green_mask: 0x0000_ff00,
        blue_mask: 0x0000_00ff,
    };

    /// Split a packed pixel into its red, green and blue components.
    pub fn unpack(&self, pixel: u32) -> [u8; 3] {
        [
            extract_channel(pixel, self.red_mask),
            extract_channel(pixel, self.green_mask),
            extract_channel(pixel, self.blue_mask),
        ]
    }
}

fn extract_channel(pixel: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    ((pixel & mask) >> mask.trailing_zeros()) as u8
}

/// Pack one RGB triple into `0x00RRGGBB`.
#[inline]
pub fn pack_pixel(red: u8, green: u8, blue: u8) -> u32 {
    (u32::from(red) << 16) | (u32::from(green) << 8) | u32::from(blue)
}

/// Pack an RGB24 buffer into `destination`, one `u32` per pixel.
///
/// `rgb` must hold exactly `destination.len() * 3` bytes.
pub fn pack_rgb24(rgb: &[u8], destination: &mut [u32]) {
    debug_assert_eq!(rgb.len(), destination.len() * 3);
    for (pixel, chunk) in destination.iter_mut().zip(rgb.chunks_exact(3)) {
        *pixel = pack_pixel(chunk[0], chunk[1], chunk[2]);
    }
}
