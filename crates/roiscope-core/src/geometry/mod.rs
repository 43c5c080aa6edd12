//! Geometry model for regions of interest.
//!
//! Every geometry keeps its defining parameters in local ("initial") space plus
//! an optional affine transform. Queries such as
//! [`Rectangle::upper_left_corner`] always return the initial values; the
//! cached display coordinates are derived from them by applying the transform
//! and are used for rendering and hit testing.
//!
//! Internal space has Y growing upward, so the wire Y of a coordinate is its
//! negation. The transform matrix is expressed in wire space; see
//! [`apply_transform`].

mod ellipse;
mod label;
mod mask;
mod point;
mod polyline;
mod rectangle;
mod vertices;

pub use ellipse::Ellipse;
pub use label::{Label, LabelBox};
pub use mask::Mask;
pub use point::PointShape;
pub use polyline::{ArrowMarkers, Line, Polygon, Polyline};
pub use rectangle::Rectangle;

use crate::transform;
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};

/// Default angular step (radians) used to trace ellipse outlines.
pub const DEFAULT_ELLIPSE_STEP: f64 = 0.1;

/// The kind of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Point,
    Line,
    Polyline,
    Polygon,
    Rectangle,
    Ellipse,
    Label,
    Mask,
}

impl ShapeKind {
    /// Name used as the trailing segment of the wire `@type`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ShapeKind::Point => "Point",
            ShapeKind::Line => "Line",
            ShapeKind::Polyline => "Polyline",
            ShapeKind::Polygon => "Polygon",
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Label => "Label",
            ShapeKind::Mask => "Mask",
        }
    }

    /// Look up a kind by wire name, ignoring case.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(name))
    }

    /// All shape kinds.
    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Point,
            ShapeKind::Line,
            ShapeKind::Polyline,
            ShapeKind::Polygon,
            ShapeKind::Rectangle,
            ShapeKind::Ellipse,
            ShapeKind::Label,
            ShapeKind::Mask,
        ]
    }
}

/// Behaviour shared by all geometries.
pub trait GeometryTrait {
    /// The kind of this geometry.
    fn kind(&self) -> ShapeKind;

    /// The affine transform, if any.
    fn transform(&self) -> Option<&Affine>;

    /// Replace the transform and refresh the display coordinates.
    fn set_transform(&mut self, transform: Option<Affine>);

    /// Translate by `(dx, dy)` in display space.
    fn translate(&mut self, dx: f64, dy: f64);

    /// Scale by `factor`.
    fn scale(&mut self, factor: f64);

    /// Display coordinates (transform applied).
    fn display_points(&self) -> &[Point];

    /// Check if a display-space point hits this geometry.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Bounding box of the display coordinates.
    fn bounds(&self) -> Rect {
        bounds_of(self.display_points())
    }
}

/// A geometry of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(PointShape),
    Line(Line),
    Polyline(Polyline),
    Polygon(Polygon),
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Label(Label),
    Mask(Mask),
}

macro_rules! dispatch {
    ($self:ident, $g:ident => $body:expr) => {
        match $self {
            Geometry::Point($g) => $body,
            Geometry::Line($g) => $body,
            Geometry::Polyline($g) => $body,
            Geometry::Polygon($g) => $body,
            Geometry::Rectangle($g) => $body,
            Geometry::Ellipse($g) => $body,
            Geometry::Label($g) => $body,
            Geometry::Mask($g) => $body,
        }
    };
}

impl GeometryTrait for Geometry {
    fn kind(&self) -> ShapeKind {
        dispatch!(self, g => g.kind())
    }

    fn transform(&self) -> Option<&Affine> {
        dispatch!(self, g => g.transform())
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        dispatch!(self, g => g.set_transform(transform))
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        dispatch!(self, g => g.translate(dx, dy))
    }

    fn scale(&mut self, factor: f64) {
        dispatch!(self, g => g.scale(factor))
    }

    fn display_points(&self) -> &[Point] {
        dispatch!(self, g => g.display_points())
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        dispatch!(self, g => g.hit_test(point, tolerance))
    }

    fn bounds(&self) -> Rect {
        dispatch!(self, g => g.bounds())
    }
}

impl Geometry {
    /// Check if this geometry is a label.
    pub fn is_label(&self) -> bool {
        matches!(self, Geometry::Label(_))
    }

    /// Get the label if this geometry is one.
    pub fn as_label(&self) -> Option<&Label> {
        match self {
            Geometry::Label(l) => Some(l),
            _ => None,
        }
    }

    /// Get the mutable label if this geometry is one.
    pub fn as_label_mut(&mut self) -> Option<&mut Label> {
        match self {
            Geometry::Label(l) => Some(l),
            _ => None,
        }
    }
}

/// Apply a wire-space transform to display-space points.
///
/// The Y coordinate is negated before and after the matrix so that the
/// matrix keeps its wire-space meaning.
pub fn apply_transform(matrix: Option<&Affine>, points: &[Point]) -> Vec<Point> {
    if matrix.is_none() {
        return points.to_vec();
    }
    from_wire_coords(&transform::apply(matrix, &to_wire_coords(points)))
}

/// Undo a wire-space transform on display-space points.
///
/// A non-invertible matrix leaves the points unchanged.
pub fn apply_inverse_transform(matrix: Option<&Affine>, points: &[Point]) -> Vec<Point> {
    if matrix.is_none() {
        return points.to_vec();
    }
    from_wire_coords(&transform::apply_inverse(matrix, &to_wire_coords(points)))
}

/// Shift the translation terms of a transform by a display-space delta.
pub(crate) fn translate_matrix(matrix: &Affine, dx: f64, dy: f64) -> Affine {
    let [a00, a10, a01, a11, a02, a12] = matrix.as_coeffs();
    Affine::new([a00, a10, a01, a11, a02 + dx, a12 - dy])
}

/// Scale the linear terms of a transform.
pub(crate) fn scale_matrix(matrix: &Affine, factor: f64) -> Affine {
    let [a00, a10, a01, a11, a02, a12] = matrix.as_coeffs();
    Affine::new([a00 * factor, a10 * factor, a01 * factor, a11 * factor, a02, a12])
}

/// Flatten display points into wire-space `[x, -y, ...]` coordinates.
fn to_wire_coords(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, -p.y]).collect()
}

fn from_wire_coords(coords: &[f64]) -> Vec<Point> {
    coords
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], -pair[1]))
        .collect()
}

/// Replace non-finite values with a default.
pub(crate) fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() { value } else { default }
}

/// Replace non-finite or non-positive extents with a default.
pub(crate) fn extent_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else if value.is_finite() && value < 0.0 {
        value.abs()
    } else {
        default
    }
}

/// Bounding box of a point set (zero-sized at the origin when empty).
pub fn bounds_of(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| {
            r.union_pt(*p)
        })
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    if points.len() == 1 {
        return (point - points[0]).hypot();
    }
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Even-odd point-in-polygon test over a closed ring.
pub fn ring_contains(ring: &[Point], point: Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Hit test a closed ring: inside, or within tolerance of its outline.
pub(crate) fn ring_hit_test(ring: &[Point], point: Point, tolerance: f64) -> bool {
    if ring_contains(ring, point) {
        return true;
    }
    let mut closed = ring.to_vec();
    if let Some(first) = ring.first() {
        closed.push(*first);
    }
    point_to_polyline_dist(point, &closed) <= tolerance
}

/// Check whether `outer` fully contains `inner`.
pub fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_wire_name_is_case_insensitive() {
        assert_eq!(ShapeKind::from_wire_name("polyline"), Some(ShapeKind::Polyline));
        assert_eq!(ShapeKind::from_wire_name("ELLIPSE"), Some(ShapeKind::Ellipse));
        assert_eq!(ShapeKind::from_wire_name("Circle"), None);
    }

    #[test]
    fn test_transform_roundtrip_with_y_flip() {
        let m = Affine::new([0.8, 0.6, -0.6, 0.8, 25.0, -10.0]);
        let points = vec![Point::new(1.0, -2.0), Point::new(-30.5, 44.0)];
        let forward = apply_transform(Some(&m), &points);
        let back = apply_inverse_transform(Some(&m), &forward);
        for (a, b) in back.iter().zip(&points) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wire_translation_moves_display_y_down() {
        // A wire-space translation of +10 in Y moves the shape down, i.e. -10 internally.
        let m = Affine::new([1.0, 0.0, 0.0, 1.0, 0.0, 10.0]);
        let moved = apply_transform(Some(&m), &[Point::new(0.0, -5.0)]);
        assert!((moved[0].y + 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_translate_matrix_signs() {
        let m = translate_matrix(&Affine::IDENTITY, 3.0, 4.0);
        assert_eq!(m.as_coeffs(), [1.0, 0.0, 0.0, 1.0, 3.0, -4.0]);
        let moved = apply_transform(Some(&m), &[Point::new(1.0, 1.0)]);
        assert!((moved[0].x - 4.0).abs() < 1e-9);
        assert!((moved[0].y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_contains() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(ring_contains(&square, Point::new(5.0, 5.0)));
        assert!(!ring_contains(&square, Point::new(15.0, 5.0)));
        assert!(ring_hit_test(&square, Point::new(11.0, 5.0), 2.0));
    }

    #[test]
    fn test_extent_defaults() {
        assert_eq!(extent_or(f64::NAN, 1.0), 1.0);
        assert_eq!(extent_or(-4.0, 1.0), 4.0);
        assert_eq!(finite_or(f64::INFINITY, 0.0), 0.0);
    }
}
