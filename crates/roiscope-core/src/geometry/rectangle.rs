//! Rectangle geometry.

use super::{
    GeometryTrait, ShapeKind, apply_transform, extent_or, finite_or, ring_hit_test, scale_matrix,
    translate_matrix,
};
use kurbo::{Affine, Point};

/// An axis-aligned rectangle in local space, optionally transformed.
///
/// `(x, y)` is the upper-left corner; since internal Y grows upward the
/// rectangle extends from `y` down to `y - height`.
#[derive(Debug)]
pub struct Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    transform: Option<Affine>,
    display: Vec<Point>,
}

impl Rectangle {
    /// Create a rectangle from its upper-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_transform(x, y, width, height, None)
    }

    /// Create a rectangle with a transform.
    pub fn with_transform(x: f64, y: f64, width: f64, height: f64, transform: Option<Affine>) -> Self {
        let mut rect = Self {
            x: finite_or(x, 0.0),
            y: finite_or(y, 0.0),
            width: extent_or(width, 1.0),
            height: extent_or(height, 1.0),
            transform,
            display: Vec::with_capacity(4),
        };
        rect.refresh();
        rect
    }

    /// Create a rectangle spanning two display-space corners (e.g. a drag).
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let left = p1.x.min(p2.x);
        let top = p1.y.max(p2.y);
        Self::new(left, top, (p2.x - p1.x).abs(), (p2.y - p1.y).abs())
    }

    /// Initial upper-left corner.
    pub fn upper_left_corner(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Move the initial upper-left corner.
    pub fn set_upper_left_corner(&mut self, corner: Point) {
        self.x = finite_or(corner.x, self.x);
        self.y = finite_or(corner.y, self.y);
        self.refresh();
    }

    /// Initial width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Set the initial width.
    pub fn set_width(&mut self, width: f64) {
        self.width = extent_or(width, self.width);
        self.refresh();
    }

    /// Initial height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Set the initial height.
    pub fn set_height(&mut self, height: f64) {
        self.height = extent_or(height, self.height);
        self.refresh();
    }

    /// Corner ring of the untransformed rectangle.
    pub(crate) fn corners(x: f64, y: f64, width: f64, height: f64) -> [Point; 4] {
        [
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y - height),
            Point::new(x, y - height),
        ]
    }

    fn refresh(&mut self) {
        let corners = Self::corners(self.x, self.y, self.width, self.height);
        self.display = apply_transform(self.transform.as_ref(), &corners);
    }
}

impl Clone for Rectangle {
    fn clone(&self) -> Self {
        Self::with_transform(self.x, self.y, self.width, self.height, self.transform)
    }
}

impl PartialEq for Rectangle {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.transform == other.transform
    }
}

impl GeometryTrait for Rectangle {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rectangle
    }

    fn transform(&self) -> Option<&Affine> {
        self.transform.as_ref()
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        self.transform = transform;
        self.refresh();
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        match &self.transform {
            Some(m) => self.transform = Some(translate_matrix(m, dx, dy)),
            None => {
                self.x += dx;
                self.y += dy;
            }
        }
        self.refresh();
    }

    fn scale(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        match &self.transform {
            Some(m) => self.transform = Some(scale_matrix(m, factor)),
            None => {
                self.width *= factor;
                self.height *= factor;
            }
        }
        self.refresh();
    }

    fn display_points(&self) -> &[Point] {
        &self.display
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        ring_hit_test(&self.display, point, tolerance)
    }
}
