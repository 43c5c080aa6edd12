//! Mask geometry: a rectangular bitmap region.

use super::rectangle::Rectangle;
use super::{GeometryTrait, ShapeKind};
use kurbo::{Affine, Point};

/// A bitmap mask placed over a rectangular region.
///
/// Geometry behaves exactly like a [`Rectangle`]; the packed mask bits are
/// carried along untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    area: Rectangle,
    /// Packed mask bits, if the server supplied them.
    pub bytes: Option<Vec<u8>>,
}

impl Mask {
    /// Create a mask covering the given region.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_transform(x, y, width, height, None)
    }

    /// Create a mask with a transform.
    pub fn with_transform(x: f64, y: f64, width: f64, height: f64, transform: Option<Affine>) -> Self {
        Self {
            area: Rectangle::with_transform(x, y, width, height, transform),
            bytes: None,
        }
    }

    /// Initial upper-left corner.
    pub fn upper_left_corner(&self) -> Point {
        self.area.upper_left_corner()
    }

    /// Initial width.
    pub fn width(&self) -> f64 {
        self.area.width()
    }

    /// Initial height.
    pub fn height(&self) -> f64 {
        self.area.height()
    }
}

impl GeometryTrait for Mask {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Mask
    }

    fn transform(&self) -> Option<&Affine> {
        self.area.transform()
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        self.area.set_transform(transform);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.area.translate(dx, dy);
    }

    fn scale(&mut self, factor: f64) {
        self.area.scale(factor);
    }

    fn display_points(&self) -> &[Point] {
        self.area.display_points()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.area.hit_test(point, tolerance)
    }
}
