//! Point geometry.

use super::{GeometryTrait, ShapeKind, apply_transform, finite_or, scale_matrix, translate_matrix};
use kurbo::{Affine, Point};

/// A single marked point.
#[derive(Debug)]
pub struct PointShape {
    position: Point,
    transform: Option<Affine>,
    display: [Point; 1],
}

impl PointShape {
    /// Create a point.
    pub fn new(position: Point) -> Self {
        Self::with_transform(position, None)
    }

    /// Create a point with a transform.
    pub fn with_transform(position: Point, transform: Option<Affine>) -> Self {
        let position = Point::new(finite_or(position.x, 0.0), finite_or(position.y, 0.0));
        let mut point = Self {
            position,
            transform,
            display: [position],
        };
        point.refresh();
        point
    }

    /// Initial position.
    pub fn position(&self) -> Point {
        self.position
    }

    fn refresh(&mut self) {
        let shown = apply_transform(self.transform.as_ref(), &[self.position]);
        self.display = [shown.first().copied().unwrap_or(self.position)];
    }
}

impl Clone for PointShape {
    fn clone(&self) -> Self {
        Self::with_transform(self.position, self.transform)
    }
}

impl PartialEq for PointShape {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.transform == other.transform
    }
}

impl GeometryTrait for PointShape {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Point
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
                self.position.x += dx;
                self.position.y += dy;
            }
        }
        self.refresh();
    }

    fn scale(&mut self, factor: f64) {
        // A point has no extent; only a transform's linear part can scale.
        if let Some(m) = &self.transform {
            if factor.is_finite() && factor > 0.0 {
                self.transform = Some(scale_matrix(m, factor));
                self.refresh();
            }
        }
    }

    fn display_points(&self) -> &[Point] {
        &self.display
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.display[0]).hypot() <= tolerance
    }
}
