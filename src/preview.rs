//! Subject preview composition.
//!
//! Every camera frame is put upright with its [`FrameTransform`] and, if a subject was detected,
//! cropped to a square around it. What happens when nobody is detected is decided by the
//! [`PreviewPolicy`].
//!
//! [`FrameTransform`]: crate::orientation::FrameTransform

use crate::{
    image::Image,
    orientation::OrientationState,
    rect::Rect,
    resolution::{AspectRatio, Resolution},
    timer::Timer,
};

/// Squares a crop rectangle and moves it into a `frame`-sized image.
///
/// The shorter side is grown symmetrically around the center to match the longer one. If the
/// square is larger than the frame it is shrunk to fit, then it is shifted so that it lies
/// entirely inside the frame.
///
/// Returns [`None`] for invalid or empty rectangles and empty frames.
pub fn square_crop(rect: &Rect, frame: Resolution) -> Option<Rect> {
    if !rect.is_valid() || rect.is_empty() || frame.is_empty() {
        return None;
    }

    Some(
        rect.grow_to_fit_aspect(AspectRatio::SQUARE)
            .fit_inside(&frame.rect()),
    )
}

/// Snaps a square crop rectangle to whole pixels of a `frame`-sized image.
///
/// The side length is rounded once, so the result stays square. The rounded origin is clamped so
/// the square lies inside the frame. Returns [`None`] if the square is less than half a pixel
/// wide or the frame is empty.
pub fn snap_to_pixels(square: &Rect, frame: Resolution) -> Option<Rect> {
    let max_side = frame.width().min(frame.height()) as f32;
    let side = square.width().max(square.height()).round().min(max_side);
    if !square.is_valid() || side < 1.0 {
        return None;
    }

    let x = square.x().round().clamp(0.0, frame.width() as f32 - side);
    let y = square.y().round().clamp(0.0, frame.height() as f32 - side);
    Some(Rect::from_top_left(x, y, side, side))
}

/// What to show in the preview while there is no crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewPolicy {
    /// Show the entire (oriented) frame.
    #[default]
    FullFrame,
    /// Keep showing the last preview.
    Hold,
    /// Remove the preview.
    Clear,
}

impl PreviewPolicy {
    /// Parses the configuration names `full`, `hold` and `clear`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "full" => Some(Self::FullFrame),
            "hold" => Some(Self::Hold),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

/// Change to apply to the preview display.
#[derive(Debug, Clone)]
pub enum PreviewUpdate {
    Show(Image),
    Hold,
    Clear,
}

/// Produces preview images from camera frames.
#[derive(Clone)]
pub struct Compositor {
    policy: PreviewPolicy,
    t_orient: Timer,
    t_crop: Timer,
}

impl Compositor {
    pub fn new(policy: PreviewPolicy) -> Self {
        Self {
            policy,
            t_orient: Timer::new("orient"),
            t_crop: Timer::new("crop"),
        }
    }

    pub fn policy(&self) -> PreviewPolicy {
        self.policy
    }

    /// Computes the preview of `image`.
    ///
    /// `crop` is in pixel coordinates of the oriented frame, as produced by
    /// [`crop_rect`](crate::mapping::crop_rect).
    pub fn compose(
        &self,
        image: &Image,
        orientation: OrientationState,
        crop: Option<&Rect>,
    ) -> PreviewUpdate {
        let oriented = self
            .t_orient
            .time(|| orientation.frame_transform().apply(image));

        let res = oriented.resolution();
        let square = crop
            .and_then(|rect| square_crop(rect, res))
            .and_then(|square| snap_to_pixels(&square, res));
        if let Some(square) = square {
            let cropped = self.t_crop.time(|| oriented.crop(&square));
            if !cropped.resolution().is_empty() {
                return PreviewUpdate::Show(cropped);
            }
            log::trace!("crop {:?} of {:?} is empty", square, oriented);
        }

        match self.policy {
            PreviewPolicy::FullFrame => PreviewUpdate::Show(oriented),
            PreviewPolicy::Hold => PreviewUpdate::Hold,
            PreviewPolicy::Clear => PreviewUpdate::Clear,
        }
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_orient, &self.t_crop].into_iter()
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(PreviewPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        image::Color,
        orientation::{CameraFacing, DeviceOrientation},
    };

    use super::*;

    #[test]
    fn squaring() {
        let frame = Resolution::new(640, 480);
        let square = square_crop(&Rect::from_top_left(10.0, 10.0, 100.0, 60.0), frame).unwrap();
        assert_eq!(square, Rect::from_top_left(10.0, 0.0, 100.0, 100.0));

        // Larger than the frame: shrunk to the frame height.
        let square = square_crop(&Rect::from_top_left(0.0, 0.0, 600.0, 100.0), frame).unwrap();
        assert_eq!(square.width(), square.height());
        assert!(frame.rect().contains_rect(&square));

        assert!(square_crop(&Rect::from_top_left(0.0, 0.0, 0.0, 0.0), frame).is_none());
        assert!(square_crop(&Rect::from_top_left(f32::NAN, 0.0, 1.0, 1.0), frame).is_none());
    }

    #[test]
    fn squaring_never_shrinks() {
        let frame = Resolution::new(1000, 1000);
        for _ in 0..1000 {
            let w = 1.0 + fastrand::f32() * 300.0;
            let h = 1.0 + fastrand::f32() * 300.0;
            let x = fastrand::f32() * (1000.0 - w);
            let y = fastrand::f32() * (1000.0 - h);
            let rect = Rect::from_top_left(x, y, w, h);

            let square = square_crop(&rect, frame).unwrap();
            approx::assert_relative_eq!(square.width(), square.height());
            assert!(square.width() >= w && square.height() >= h, "{rect:?} -> {square:?}");
            assert!(square.x() >= -1e-3 && square.y() >= -1e-3, "{square:?}");
            assert!(
                square.max_x() <= 1000.001 && square.max_y() <= 1000.001,
                "{square:?}"
            );
        }
    }

    #[test]
    fn snapping_keeps_squares_square() {
        let frame = Resolution::new(100, 100);
        assert_eq!(
            snap_to_pixels(&Rect::from_top_left(0.5, 0.0, 10.6, 10.6), frame),
            Some(Rect::from_top_left(1.0, 0.0, 11.0, 11.0))
        );
        assert_eq!(
            snap_to_pixels(&Rect::from_top_left(89.6, 0.0, 10.6, 10.6), frame),
            Some(Rect::from_top_left(89.0, 0.0, 11.0, 11.0))
        );
        assert_eq!(
            snap_to_pixels(&Rect::from_top_left(0.0, 0.0, 0.2, 0.2), frame),
            None
        );

        for _ in 0..1000 {
            let side = 1.0 + fastrand::f32() * 99.0;
            let x = fastrand::f32() * (100.0 - side);
            let y = fastrand::f32() * (100.0 - side);
            let snapped =
                snap_to_pixels(&Rect::from_top_left(x, y, side, side), frame).unwrap();
            assert_eq!(snapped.width(), snapped.height());
            assert!(frame.rect().contains_rect(&snapped), "{snapped:?}");
        }
    }

    #[test]
    fn fractional_crop_yields_square_preview() {
        let image = checkerboard(100, 100);
        let state = OrientationState::new(DeviceOrientation::LandscapeLeft, CameraFacing::Back);
        let crop = Rect::from_top_left(0.5, 0.0, 10.6, 10.6);

        match Compositor::default().compose(&image, state, Some(&crop)) {
            PreviewUpdate::Show(preview) => {
                assert_eq!(preview.resolution(), Resolution::new(11, 11));
                assert_eq!(preview.get(0, 0), image.get(1, 0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn checkerboard(width: u32, height: u32) -> Image {
        let mut image = Image::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.set(x, y, Color::from_rgb8(x as u8, y as u8, 0));
            }
        }
        image
    }

    #[test]
    fn crops_oriented_frame() {
        let image = checkerboard(40, 20);
        let portrait = OrientationState::new(DeviceOrientation::Portrait, CameraFacing::Back);
        let crop = Rect::from_top_left(0.0, 0.0, 10.0, 5.0);

        match Compositor::default().compose(&image, portrait, Some(&crop)) {
            PreviewUpdate::Show(preview) => {
                assert_eq!(preview.resolution(), Resolution::new(10, 10));
                // Top-left of the upright frame is the bottom-left of the raw frame.
                assert_eq!(preview.get(0, 0), image.get(0, 19));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_crop_policies() {
        let image = checkerboard(8, 6);
        let state = OrientationState::new(DeviceOrientation::LandscapeLeft, CameraFacing::Back);

        match Compositor::new(PreviewPolicy::FullFrame).compose(&image, state, None) {
            PreviewUpdate::Show(preview) => assert_eq!(preview.resolution(), image.resolution()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Compositor::new(PreviewPolicy::Hold).compose(&image, state, None),
            PreviewUpdate::Hold
        ));
        assert!(matches!(
            Compositor::new(PreviewPolicy::Clear).compose(&image, state, None),
            PreviewUpdate::Clear
        ));
        assert_eq!(PreviewPolicy::from_name("hold"), Some(PreviewPolicy::Hold));
        assert_eq!(PreviewPolicy::from_name("nope"), None);
    }
}
