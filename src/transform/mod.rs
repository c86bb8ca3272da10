//! 2D affine transforms.
//!
//! `AffineTransform2D` stores the six parameters of
//!
//! ```text
//! [ x' ]   [ m00  m01  m02 ] [ x ]
//! [ y' ] = [ m10  m11  m12 ] [ y ]
//!                            [ 1 ]
//! ```
//!
//! Constructors and accessors use the column order
//! `(m00, m10, m01, m11, m02, m12)`. Composition follows the usual graphics
//! convention: `a.concatenate(&b)` yields `a * b`, i.e. `b` is applied first.

pub mod text;

use crate::geometry::Point2;
use crate::util::{AlignError, AlignResult};

/// Relative determinant threshold below which a transform is singular.
const SINGULAR_REL_TOL: f64 = 1e-12;

/// Six-parameter affine transform in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform2D {
    m00: f64,
    m10: f64,
    m01: f64,
    m11: f64,
    m02: f64,
    m12: f64,
}

impl Default for AffineTransform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform2D {
    /// Creates a transform from its parameters in column order.
    pub const fn new(m00: f64, m10: f64, m01: f64, m11: f64, m02: f64, m12: f64) -> Self {
        Self {
            m00,
            m10,
            m01,
            m11,
            m02,
            m12,
        }
    }

    /// Creates a transform from the two matrix rows `[m00, m01, m02]`, `[m10, m11, m12]`.
    pub const fn from_row_major(rows: [[f64; 3]; 2]) -> Self {
        Self::new(
            rows[0][0], rows[1][0], rows[0][1], rows[1][1], rows[0][2], rows[1][2],
        )
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub const fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `theta` radians about the origin.
    ///
    /// Positive angles rotate the +x axis towards +y. Quarter turns produce
    /// exact zeros and ones.
    pub fn rotation(theta: f64) -> Self {
        let (sin, cos) = exact_sin_cos(theta);
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Rotation by `theta` radians about `(anchor_x, anchor_y)`.
    pub fn rotation_about(theta: f64, anchor_x: f64, anchor_y: f64) -> Self {
        Self::translation(anchor_x, anchor_y)
            .concatenate(&Self::rotation(theta))
            .concatenate(&Self::translation(-anchor_x, -anchor_y))
    }

    /// Returns the parameters in column order `(m00, m10, m01, m11, m02, m12)`.
    pub fn to_array(&self) -> [f64; 6] {
        [self.m00, self.m10, self.m01, self.m11, self.m02, self.m12]
    }

    /// Returns the two matrix rows.
    pub fn to_row_major(&self) -> [[f64; 3]; 2] {
        [[self.m00, self.m01, self.m02], [self.m10, self.m11, self.m12]]
    }

    pub fn m00(&self) -> f64 {
        self.m00
    }

    pub fn m10(&self) -> f64 {
        self.m10
    }

    pub fn m01(&self) -> f64 {
        self.m01
    }

    pub fn m11(&self) -> f64 {
        self.m11
    }

    /// Translation along x.
    pub fn m02(&self) -> f64 {
        self.m02
    }

    /// Translation along y.
    pub fn m12(&self) -> f64 {
        self.m12
    }

    /// Returns `(m02, m12)`.
    pub fn translation_components(&self) -> (f64, f64) {
        (self.m02, self.m12)
    }

    /// Returns a copy with the translation replaced.
    pub fn with_translation(&self, tx: f64, ty: f64) -> Self {
        Self {
            m02: tx,
            m12: ty,
            ..*self
        }
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// Returns true when all six parameters are finite.
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Returns true when the linear part has no rotation or shear.
    pub fn preserves_axes(&self) -> bool {
        self.m01 == 0.0 && self.m10 == 0.0
    }

    /// Returns true when the transform has a usable inverse.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        let scale = (self.m00 * self.m11).abs().max((self.m01 * self.m10).abs());
        det.is_finite() && det != 0.0 && det.abs() > SINGULAR_REL_TOL * scale
    }

    /// Returns `self * other`: `other` is applied first.
    pub fn concatenate(&self, other: &Self) -> Self {
        Self::new(
            self.m00 * other.m00 + self.m01 * other.m10,
            self.m10 * other.m00 + self.m11 * other.m10,
            self.m00 * other.m01 + self.m01 * other.m11,
            self.m10 * other.m01 + self.m11 * other.m11,
            self.m00 * other.m02 + self.m01 * other.m12 + self.m02,
            self.m10 * other.m02 + self.m11 * other.m12 + self.m12,
        )
    }

    /// Returns `other * self`: `self` is applied first.
    pub fn pre_concatenate(&self, other: &Self) -> Self {
        other.concatenate(self)
    }

    /// Returns the algebraic inverse.
    pub fn inverse(&self) -> AlignResult<Self> {
        let det = self.determinant();
        if !self.is_invertible() {
            return Err(AlignError::NonInvertible { determinant: det });
        }
        let inv_det = 1.0 / det;
        let m00 = self.m11 * inv_det;
        let m10 = -self.m10 * inv_det;
        let m01 = -self.m01 * inv_det;
        let m11 = self.m00 * inv_det;
        let m02 = (self.m01 * self.m12 - self.m11 * self.m02) * inv_det;
        let m12 = (self.m10 * self.m02 - self.m00 * self.m12) * inv_det;
        Ok(Self::new(m00, m10, m01, m11, m02, m12))
    }

    /// Maps a point.
    pub fn apply(&self, p: Point2) -> Point2 {
        Point2::new(
            self.m00 * p.x + self.m01 * p.y + self.m02,
            self.m10 * p.x + self.m11 * p.y + self.m12,
        )
    }

    /// Maps every point, preserving order.
    pub fn apply_all(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|&p| self.apply(p)).collect()
    }

    /// Returns true when every parameter differs by at most `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

fn exact_sin_cos(theta: f64) -> (f64, f64) {
    let sin = theta.sin();
    if sin == 1.0 || sin == -1.0 {
        return (sin, 0.0);
    }
    let cos = theta.cos();
    if cos == 1.0 || cos == -1.0 {
        return (0.0, cos);
    }
    (sin, cos)
}

#[cfg(test)]
mod tests {
    use super::AffineTransform2D;
    use crate::geometry::Point2;
    use crate::util::AlignError;

    #[test]
    fn concatenate_applies_argument_first() {
        let t = AffineTransform2D::translation(5.0, 0.0);
        let s = AffineTransform2D::scale(2.0, 2.0);
        let p = t.concatenate(&s).apply(Point2::new(1.0, 1.0));
        assert_eq!(p, Point2::new(7.0, 2.0));
        let q = t.pre_concatenate(&s).apply(Point2::new(1.0, 1.0));
        assert_eq!(q, Point2::new(12.0, 2.0));
    }

    #[test]
    fn quarter_turn_is_exact() {
        let r = AffineTransform2D::rotation(std::f64::consts::FRAC_PI_2);
        assert_eq!(r, AffineTransform2D::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_about_anchor_fixes_anchor() {
        let r = AffineTransform2D::rotation_about(0.7, 3.0, -2.0);
        let p = r.apply(Point2::new(3.0, -2.0));
        assert!((p.x - 3.0).abs() < 1e-12);
        assert!((p.y + 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_of_shear() {
        let t = AffineTransform2D::new(1.0, 0.0, 1.0, 1.0, 0.0, 0.0);
        assert_eq!(
            t.inverse().unwrap(),
            AffineTransform2D::new(1.0, 0.0, -1.0, 1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn singular_matrices_are_rejected() {
        let t = AffineTransform2D::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(!t.is_invertible());
        assert_eq!(
            t.inverse().unwrap_err(),
            AlignError::NonInvertible { determinant: 0.0 }
        );
        assert!(!AffineTransform2D::new(1.0, 1.0, 1.0, 1.0, 3.0, 4.0).is_invertible());
    }

    #[test]
    fn row_major_round_trip() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t = AffineTransform2D::from_row_major(rows);
        assert_eq!(t.m01(), 2.0);
        assert_eq!(t.m10(), 4.0);
        assert_eq!(t.to_row_major(), rows);
    }
}
