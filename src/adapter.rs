//! Host image adapters.
//!
//! The decode loop hands every converted frame to an [`ImageAdapter`] as a
//! buffer of packed pixels plus its dimensions and [`PixelLayout`]. The
//! adapter decides what a host image is:
//!
//! - [`PackedImageAdapter`] keeps the packed buffer as a [`PackedImage`].
//! - [`DynamicImageAdapter`] unpacks it into an [`image::DynamicImage`].

use image::{DynamicImage, RgbImage};

use crate::{error::DecodingError, pixel::PixelLayout};

/// Turns packed pixel buffers into host images.
pub trait ImageAdapter {
    /// The host image type produced for every frame.
    type Image;

    /// Allocate a zeroed buffer for `len` packed pixels.
    fn allocate(&self, len: usize) -> Vec<u32> {
        vec![0; len]
    }

    /// Wrap `pixels` (`width * height` entries in `layout`) as a host image.
    fn create_image(
        &self,
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self::Image, DecodingError>;
}

/// A decoded frame as packed 32-bit pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Vec<u32>,
}

impl PackedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// The packed pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// Unpack into an 8-bit RGB image.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let index = y as usize * self.width as usize + x as usize;
            image::Rgb(self.layout.unpack(self.pixels[index]))
        })
    }
}

/// Produces [`PackedImage`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedImageAdapter;

impl ImageAdapter for PackedImageAdapter {
    type Image = PackedImage;

    fn create_image(
        &self,
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<PackedImage, DecodingError> {
        check_len(&pixels, width, height)?;
        Ok(PackedImage {
            width,
            height,
            layout,
            pixels,
        })
    }
}

/// Produces [`image::DynamicImage`] values in RGB8.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicImageAdapter;

impl ImageAdapter for DynamicImageAdapter {
    type Image = DynamicImage;

    fn create_image(
        &self,
        pixels: Vec<u32>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<DynamicImage, DecodingError> {
        check_len(&pixels, width, height)?;
        let buffer: Vec<u8> = pixels
            .iter()
            .flat_map(|&pixel| layout.unpack(pixel))
            .collect();
        let rgb_image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            DecodingError::ImageConversion(
                "Failed to construct RGB image from packed pixels".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(rgb_image))
    }
}

fn check_len(pixels: &[u32], width: u32, height: u32) -> Result<(), DecodingError> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(DecodingError::ImageConversion(format!(
            "expected {expected} pixels for {width}x{height}, got {}",
            pixels.len()
        )));
    }
    Ok(())
}
