//! Rectangle types.
//!
//! These are used throughout the library for detection boxes, overlay paths and crop regions.
//! Whether a [`Rect`] is in normalized or pixel coordinates, and where its origin is, depends on
//! where it comes from; see the crate-level docs.

use std::fmt;

use nalgebra::{Point2, Vector2};

use crate::affine::Affine;
use crate::resolution::AspectRatio;

/// An axis-aligned rectangle with `f32` coordinates.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vector2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    /// Creates a rectangle extending from `(x, y)` towards positive X and Y.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_center(x + width * 0.5, y + height * 0.5, width, height)
    }

    /// Computes the (axis-aligned) bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = Point2<f32>>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let first = iter.next()?.coords;
        let (mut min, mut max) = (first, first);

        for pt in iter {
            min = min.inf(&pt.coords);
            max = max.sup(&pt.coords);
        }

        Some(Self::from_top_left(
            min.x,
            min.y,
            max.x - min.x,
            max.y - min.y,
        ))
    }

    /// Returns the X coordinate of the side with the smallest X value.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Returns the Y coordinate of the side with the smallest Y value.
    #[inline]
    pub fn y(&self) -> f32 {
        self.center.y - self.size.y * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn max_x(&self) -> f32 {
        self.x() + self.width()
    }

    #[inline]
    pub fn max_y(&self) -> f32 {
        self.y() + self.height()
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        Point2::from(self.center)
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    /// Returns `true` if the rectangle covers no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.area() <= 0.0
    }

    /// Returns `true` if no coordinate is NaN or infinite and the size is non-negative.
    pub fn is_valid(&self) -> bool {
        self.center.iter().chain(self.size.iter()).all(|v| v.is_finite())
            && self.size.x >= 0.0
            && self.size.y >= 0.0
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            center: self.center + Vector2::new(dx, dy),
            ..*self
        }
    }

    /// Grows this rectangle by `horizontal` on the left and right, and `vertical` on the top and
    /// bottom.
    #[must_use]
    pub fn grow(&self, horizontal: f32, vertical: f32) -> Self {
        Rect {
            size: self.size + Vector2::new(horizontal * 2.0, vertical * 2.0),
            ..*self
        }
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    ///
    /// The center stays where it is, and neither dimension ever shrinks.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target_aspect.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target_aspect.as_f32();
        }

        res
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the intersection is empty (ie. the rectangles do not overlap).
    /// Rectangles that only touch produce a zero-sized intersection.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min_x = self.x().max(other.x());
        let min_y = self.y().max(other.y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if !(min_x <= max_x && min_y <= max_y) {
            return None;
        }

        Some(Rect::from_top_left(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Clips `self` to `bounds`.
    ///
    /// If the rectangles do not overlap, or `self` is not [valid](Self::is_valid), a zero-sized
    /// rectangle at the point of `bounds` closest to `self` is returned, so the result is always a
    /// valid rectangle inside of `bounds`.
    pub fn clip_to(&self, bounds: &Rect) -> Rect {
        if !self.is_valid() {
            return Rect::from_top_left(bounds.x(), bounds.y(), 0.0, 0.0);
        }

        match self.intersection(bounds) {
            Some(rect) => rect,
            None => {
                let x = self.x().clamp(bounds.x(), bounds.max_x());
                let y = self.y().clamp(bounds.y(), bounds.max_y());
                Rect::from_top_left(x, y, 0.0, 0.0)
            }
        }
    }

    /// Moves (and, if necessary, shrinks) `self` so that it lies entirely inside of `bounds`.
    ///
    /// Unlike [`Rect::clip_to`], this preserves the aspect ratio of `self`: when `self` is larger
    /// than `bounds`, both dimensions are scaled down around the center before moving it.
    pub fn fit_inside(&self, bounds: &Rect) -> Rect {
        let mut res = *self;
        let scale = f32::min(
            1.0,
            f32::min(
                bounds.width() / self.width(),
                bounds.height() / self.height(),
            ),
        );
        if scale < 1.0 {
            res.size *= scale;
        }

        let dx = if res.x() < bounds.x() {
            bounds.x() - res.x()
        } else if res.max_x() > bounds.max_x() {
            bounds.max_x() - res.max_x()
        } else {
            0.0
        };
        let dy = if res.y() < bounds.y() {
            bounds.y() - res.y()
        } else if res.max_y() > bounds.max_y() {
            bounds.max_y() - res.max_y()
        } else {
            0.0
        };

        res.move_by(dx, dy)
    }

    pub fn contains_point(&self, point: Point2<f32>) -> bool {
        self.x() <= point.x
            && self.y() <= point.y
            && self.max_x() >= point.x
            && self.max_y() >= point.y
    }

    /// Returns `true` if `other` lies entirely inside of `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.x() <= other.x()
            && self.y() <= other.y()
            && self.max_x() >= other.max_x()
            && self.max_y() >= other.max_y()
    }

    pub fn corners(&self) -> [Point2<f32>; 4] {
        let [x, y] = [self.x(), self.y()];
        let [w, h] = [self.width(), self.height()];
        [
            Point2::new(x, y),
            Point2::new(x + w, y),
            Point2::new(x + w, y + h),
            Point2::new(x, y + h),
        ]
    }

    /// Applies an affine transform to `self` and returns the bounding rectangle of the result.
    ///
    /// For the flips, scales and quarter-turn rotations used in this crate, the result is exact.
    #[must_use]
    pub fn transform(&self, affine: &Affine) -> Rect {
        match Rect::bounding(self.corners().map(|p| affine.apply(p))) {
            Some(rect) => rect,
            None => unreachable!(),
        }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_point() {
        let rect = Rect::from_top_left(-5.0, 5.0, 10.0, 5.0);
        assert!(rect.contains_point(Point2::new(-5.0, 5.0)));
        assert!(rect.contains_point(Point2::new(4.0, 9.0)));
        assert!(!rect.contains_point(Point2::new(6.0, 9.0)));
        assert!(!rect.contains_point(Point2::new(4.0, 11.0)));
    }

    #[test]
    fn test_intersection() {
        let big = Rect::from_top_left(0.0, 0.0, 10.0, 10.0);
        let point = Rect::from_top_left(5.0, 5.0, 0.0, 0.0);
        assert_eq!(big.intersection(&point), Some(point));
        assert_eq!(point.intersection(&big), Some(point));
        assert_eq!(
            big.intersection(&Rect::from_top_left(20.0, 0.0, 1.0, 1.0)),
            None
        );
        assert_eq!(
            big.intersection(&Rect::from_top_left(-5.0, 5.0, 10.0, 10.0)),
            Some(Rect::from_top_left(0.0, 5.0, 5.0, 5.0))
        );
    }

    #[test]
    fn test_bounding() {
        assert_eq!(
            Rect::bounding([
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(-1.0, -1.0)
            ])
            .unwrap(),
            Rect::from_center(0.0, 0.0, 2.0, 2.0),
        );
        assert!(Rect::bounding([]).is_none());
    }

    #[test]
    fn test_fit_aspect() {
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn test_clip_to() {
        let bounds = Rect::from_top_left(0.0, 0.0, 100.0, 50.0);
        assert_eq!(
            Rect::from_top_left(-10.0, -10.0, 30.0, 30.0).clip_to(&bounds),
            Rect::from_top_left(0.0, 0.0, 20.0, 20.0)
        );
        assert_eq!(
            Rect::from_top_left(200.0, 10.0, 30.0, 30.0).clip_to(&bounds),
            Rect::from_top_left(100.0, 10.0, 0.0, 0.0)
        );
        let nan = Rect::from_top_left(f32::NAN, 0.0, 1.0, 1.0);
        assert!(nan.clip_to(&bounds).is_valid());
        assert!(nan.clip_to(&bounds).is_empty());
    }

    #[test]
    fn test_fit_inside() {
        let bounds = Rect::from_top_left(0.0, 0.0, 100.0, 50.0);
        assert_eq!(
            Rect::from_top_left(90.0, -5.0, 20.0, 20.0).fit_inside(&bounds),
            Rect::from_top_left(80.0, 0.0, 20.0, 20.0)
        );
        let shrunk = Rect::from_center(50.0, 25.0, 80.0, 80.0).fit_inside(&bounds);
        assert_eq!(shrunk, Rect::from_top_left(25.0, 0.0, 50.0, 50.0));
        assert!(bounds.contains_rect(&shrunk));
    }

    #[test]
    fn test_validity() {
        let zero = Rect::from_top_left(0.0, 0.0, 0.0, 0.0);
        assert!(zero.is_valid());
        assert!(zero.is_empty());
        assert!(!Rect::from_top_left(0.0, 0.0, -1.0, 1.0).is_valid());
        assert!(!Rect::from_top_left(0.0, f32::INFINITY, 1.0, 1.0).is_valid());
    }
}
