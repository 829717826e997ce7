//! Mapping of normalized detection boxes to pixel rectangles.
//!
//! Detectors report boxes in *normalized* coordinates: fractions of the image width and height,
//! with the origin in the **bottom-left** corner and Y pointing up. Everything that gets drawn or
//! cropped uses pixel coordinates with the origin in the **top-left** corner and Y pointing down.
//!
//! The two consumers of detection boxes are [`overlay_rect`], which computes where a tracking box
//! is drawn on top of the live preview, and [`crop_rect`], which computes the region of the
//! (oriented) frame the subject preview shows. Both go through [`facing_adjusted`] and
//! [`normalized_to_pixel`], so a box lands on the same part of the picture in both.

use crate::{
    affine::Affine, orientation::CameraFacing, rect::Rect, resolution::Resolution,
};

/// Mirrors a normalized box top-to-bottom (`y' = 1 - y - h`).
///
/// This converts between bottom-left and top-left origins.
pub fn vertical_flip(normalized: &Rect) -> Rect {
    normalized.transform(&Affine::vertical_flip())
}

/// Mirrors a normalized box left-to-right (`x' = 1 - x - w`).
pub fn horizontal_flip(normalized: &Rect) -> Rect {
    normalized.transform(&Affine::horizontal_flip())
}

/// Compensates for front-camera sensor mirroring.
///
/// Front-camera boxes are flipped vertically, back-camera boxes are returned unchanged.
pub fn facing_adjusted(normalized: &Rect, facing: CameraFacing) -> Rect {
    match facing {
        CameraFacing::Front => vertical_flip(normalized),
        CameraFacing::Back => *normalized,
    }
}

/// Converts a bottom-left origin normalized box to a top-left origin pixel rectangle in `res`.
pub fn normalized_to_pixel(normalized: &Rect, res: Resolution) -> Rect {
    normalized.transform(
        &Affine::vertical_flip().then(&Affine::scale(res.width() as f32, res.height() as f32)),
    )
}

/// Inverse of [`normalized_to_pixel`].
///
/// Returns [`None`] if `res` is empty.
pub fn pixel_to_normalized(pixel: &Rect, res: Resolution) -> Option<Rect> {
    if res.is_empty() {
        return None;
    }
    Some(pixel.transform(
        &Affine::scale(1.0 / res.width() as f32, 1.0 / res.height() as f32)
            .then(&Affine::vertical_flip()),
    ))
}

/// How the camera feed is laid out inside of the overlay view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayFit {
    /// The normalized box maps directly onto the view bounds.
    #[default]
    Stretch,
    /// A `frame`-sized feed is scaled to completely fill the view while keeping its aspect ratio,
    /// and centered. Parts of the feed may be cut off.
    AspectFill { frame: Resolution },
}

/// Computes the overlay rectangle of a normalized detection box, in `view` pixel coordinates.
pub fn overlay_rect(
    normalized: &Rect,
    view: Resolution,
    facing: CameraFacing,
    fit: OverlayFit,
) -> Rect {
    let adjusted = facing_adjusted(normalized, facing);
    match fit {
        OverlayFit::Stretch => normalized_to_pixel(&adjusted, view),
        OverlayFit::AspectFill { frame } => {
            let fill = view.fill_rect(frame);
            adjusted.transform(
                &Affine::vertical_flip()
                    .then(&Affine::scale(fill.width(), fill.height()))
                    .then(&Affine::translation(fill.x(), fill.y())),
            )
        }
    }
}

/// Computes the crop rectangle of a normalized detection box, in pixel coordinates of the
/// *oriented* frame (the frame after its [`FrameTransform`] was applied).
///
/// [`FrameTransform`]: crate::orientation::FrameTransform
pub fn crop_rect(normalized: &Rect, oriented_frame: Resolution, facing: CameraFacing) -> Rect {
    normalized_to_pixel(&facing_adjusted(normalized, facing), oriented_frame)
}
