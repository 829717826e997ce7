//! Types for representing image resolutions.

use std::fmt;

use crate::rect::Rect;

/// Resolution (`width x height`) of an image, view, camera, or display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 1080p resolution: `1920x1080`
    pub const RES_1080P: Self = Self {
        width: 1920,
        height: 1080,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` if either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the resolution with width and height swapped.
    ///
    /// This is the resolution of an image after a rotation by 90° or 270°.
    #[inline]
    #[must_use]
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Returns a [`Rect`] at `(0, 0)` covering this resolution.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Computes where an image of resolution `frame` ends up when it is scaled to completely fill
    /// `self` while keeping its aspect ratio, centered.
    ///
    /// The returned [`Rect`] is in the coordinate system of `self`, and will extend past `self` on
    /// the axis where the aspect ratios disagree (the parts that get cut off by the display).
    pub fn fill_rect(&self, frame: Resolution) -> Rect {
        if frame.is_empty() || self.is_empty() {
            return self.rect();
        }

        let scale = f32::max(
            self.width as f32 / frame.width as f32,
            self.height as f32 / frame.height as f32,
        );
        let w = frame.width as f32 * scale;
        let h = frame.height as f32 * scale;

        let rect = Rect::from_center(self.width as f32 * 0.5, self.height as f32 * 0.5, w, h);
        log::trace!("fill {} with {} -> {:?}", self, frame, rect);
        rect
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height of an image.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: `width` and `height` are nonzero and as small as possible (ie. their GCD is 1).
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio, used for the subject preview.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    /// Returns the `f32` corresponding to this ratio.
    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(1920 / gcd(1920, 1080), 16);
        assert_eq!(1080 / gcd(1920, 1080), 9);
    }

    #[test]
    fn aspect_ratio() {
        let ratio1 = AspectRatio::new(1920, 1080).unwrap();
        let ratio2 = AspectRatio::new(1280, 720).unwrap();
        assert_eq!(ratio1, ratio2);
        assert_eq!(ratio1.to_string(), "16:9");
        assert!(AspectRatio::new(0, 1).is_none());
    }

    #[test]
    fn transposed() {
        assert_eq!(
            Resolution::RES_1080P.transposed(),
            Resolution::new(1080, 1920)
        );
        assert_eq!(Resolution::new(3, 2).transposed().transposed(), Resolution::new(3, 2));
    }

    #[test]
    fn fill_rect() {
        // Same aspect ratio: plain scaling.
        let view = Resolution::new(640, 360);
        assert_eq!(
            view.fill_rect(Resolution::RES_1080P),
            Rect::from_top_left(0.0, 0.0, 640.0, 360.0)
        );

        // Landscape frame in a portrait view: width overflows on both sides.
        let view = Resolution::new(100, 200);
        let rect = view.fill_rect(Resolution::new(200, 100));
        assert_eq!(rect, Rect::from_top_left(-150.0, 0.0, 400.0, 200.0));
    }
}
