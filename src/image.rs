//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image with the raster operations needed to put camera
//!   frames upright (quarter-turn rotations and mirroring) and to cut out subject previews.
//! - [`Color`], an sRGB color with alpha channel.
//! - The [`draw`] module, with guard-based functions to quickly visualize rectangles and text.

pub mod draw;


use std::{fmt, ops::Index, path::Path};

use anyhow::{bail, Context};
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops, ImageBuffer, Rgba, RgbaImage};

use crate::{rect::Rect, resolution::Resolution};

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// Returns `true` if `path` has one of the file extensions [`Image::load`] accepts.
pub fn is_supported_path(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
            .with_context(|| format!("failed to load image from '{}'", path.as_ref().display()))
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        let buf = image::load_from_memory_with_format(&data, format.to_image_format())?.to_rgba8();
        Ok(Self { buf })
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        match ImageFormat::from_path(path)? {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(self.buf.clone())
                .to_rgb8()
                .save(path),
            ImageFormat::Png => self.buf.save(path),
        }
        .with_context(|| format!("failed to save image to '{}'", path.display()))
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image.
    ///
    /// The rectangle will be positioned at `(0, 0)` and have the width and height of the image.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.resolution().rect()
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Copies the area covered by `rect` into a new image.
    ///
    /// `rect` is rounded to whole pixels and clipped to the image, so the result may be smaller
    /// than `rect` (or even empty).
    pub fn crop(&self, rect: &Rect) -> Image {
        let clipped = rect.clip_to(&self.rect());
        let x = (clipped.x().round() as u32).min(self.width());
        let y = (clipped.y().round() as u32).min(self.height());
        let max_x = (clipped.max_x().round() as u32).clamp(x, self.width());
        let max_y = (clipped.max_y().round() as u32).clamp(y, self.height());

        Image {
            buf: imageops::crop_imm(&self.buf, x, y, max_x - x, max_y - y).to_image(),
        }
    }

    /// Rotates the image clockwise by `turns` quarter turns.
    pub fn rotate_cw(&self, turns: u8) -> Image {
        let buf = match turns % 4 {
            0 => self.buf.clone(),
            1 => imageops::rotate90(&self.buf),
            2 => imageops::rotate180(&self.buf),
            _ => imageops::rotate270(&self.buf),
        };
        Image { buf }
    }

    pub fn flip_horizontal(&self) -> Image {
        Image {
            buf: imageops::flip_horizontal(&self.buf),
        }
    }

    pub fn flip_vertical(&self) -> Image {
        Image {
            buf: imageops::flip_vertical(&self.buf),
        }
    }

    /// Clears the image, setting every pixel value to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the sRGB color space and use non-premultiplied alpha.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}
