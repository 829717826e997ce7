//! 2D affine transforms.
//!
//! [`Affine`] wraps a homogeneous 3x3 matrix. Transforms compose left-to-right with
//! [`Affine::then`]: `a.then(b)` first applies `a`, then `b`.

use std::fmt;

use nalgebra::{Matrix3, Point2, Vector2};

/// A 2D affine transform.
#[derive(Clone, Copy, PartialEq)]
pub struct Affine {
    matrix: Matrix3<f32>,
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            matrix: Matrix3::new_translation(&Vector2::new(dx, dy)),
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            matrix: Matrix3::new_nonuniform_scaling(&Vector2::new(sx, sy)),
        }
    }

    /// A rotation by `turns` quarter turns around the origin.
    ///
    /// In a coordinate system where Y points down (pixel coordinates), a positive number of turns
    /// rotates clockwise. The matrices are exact, so no rounding noise is introduced.
    pub fn quarter_turns(turns: i32) -> Self {
        #[rustfmt::skip]
        let matrix = match turns.rem_euclid(4) {
            0 => Matrix3::identity(),
            1 => Matrix3::new(
                0.0, -1.0, 0.0,
                1.0, 0.0, 0.0,
                0.0, 0.0, 1.0,
            ),
            2 => Matrix3::new(
                -1.0, 0.0, 0.0,
                0.0, -1.0, 0.0,
                0.0, 0.0, 1.0,
            ),
            _ => Matrix3::new(
                0.0, 1.0, 0.0,
                -1.0, 0.0, 0.0,
                0.0, 0.0, 1.0,
            ),
        };
        Self { matrix }
    }

    /// Mirrors the unit square top-to-bottom: `y' = 1 - y`.
    ///
    /// This is a scale of Y by -1, preceded by a translation that keeps `[0, 1]` mapped onto
    /// itself. Applied to normalized coordinates it converts between bottom-left and top-left
    /// origins.
    pub fn vertical_flip() -> Self {
        Self::translation(0.0, -1.0).then(&Self::scale(1.0, -1.0))
    }

    /// Mirrors the unit square left-to-right: `x' = 1 - x`.
    pub fn horizontal_flip() -> Self {
        Self::translation(-1.0, 0.0).then(&Self::scale(-1.0, 1.0))
    }

    /// Returns a transform that applies `self`, then `next`.
    #[must_use]
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            matrix: next.matrix * self.matrix,
        }
    }

    /// Returns the inverse transform, or `None` if `self` is degenerate.
    pub fn inverse(&self) -> Option<Affine> {
        self.matrix.try_inverse().map(|matrix| Affine { matrix })
    }

    pub fn apply(&self, point: Point2<f32>) -> Point2<f32> {
        self.matrix.transform_point(&point)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.matrix;
        write!(
            f,
            "Affine [{} {} {}; {} {} {}]",
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
        )
    }
}
