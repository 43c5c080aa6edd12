//! Ellipse geometry.

use super::{
    DEFAULT_ELLIPSE_STEP, GeometryTrait, ShapeKind, apply_inverse_transform, apply_transform,
    extent_or, finite_or, scale_matrix, translate_matrix,
};
use crate::transform;
use kurbo::{Affine, Point};
use std::f64::consts::TAU;

/// An ellipse given by center and radii, traced as a polygon for display.
#[derive(Debug)]
pub struct Ellipse {
    center: Point,
    radius_x: f64,
    radius_y: f64,
    step: f64,
    transform: Option<Affine>,
    display: Vec<Point>,
}

impl Ellipse {
    /// Create an ellipse.
    pub fn new(center: Point, radius_x: f64, radius_y: f64) -> Self {
        Self::with_transform(center, radius_x, radius_y, None)
    }

    /// Create an ellipse with a transform.
    pub fn with_transform(center: Point, radius_x: f64, radius_y: f64, transform: Option<Affine>) -> Self {
        Self::with_step(center, radius_x, radius_y, transform, DEFAULT_ELLIPSE_STEP)
    }

    /// Create an ellipse with a custom outline step (radians).
    pub fn with_step(
        center: Point,
        radius_x: f64,
        radius_y: f64,
        transform: Option<Affine>,
        step: f64,
    ) -> Self {
        let step = if step.is_finite() && step > 0.0 && step < TAU {
            step
        } else {
            DEFAULT_ELLIPSE_STEP
        };
        let mut ellipse = Self {
            center: Point::new(finite_or(center.x, 0.0), finite_or(center.y, 0.0)),
            radius_x: extent_or(radius_x, 1.0),
            radius_y: extent_or(radius_y, 1.0),
            step,
            transform,
            display: Vec::new(),
        };
        ellipse.refresh();
        ellipse
    }

    /// Create a circle.
    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, radius)
    }

    /// Initial center.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Move the initial center.
    pub fn set_center(&mut self, center: Point) {
        self.center = Point::new(finite_or(center.x, self.center.x), finite_or(center.y, self.center.y));
        self.refresh();
    }

    /// Initial radii `(radius_x, radius_y)`.
    pub fn radius(&self) -> (f64, f64) {
        (self.radius_x, self.radius_y)
    }

    /// Set the initial radii.
    pub fn set_radius(&mut self, radius_x: f64, radius_y: f64) {
        self.radius_x = extent_or(radius_x, self.radius_x);
        self.radius_y = extent_or(radius_y, self.radius_y);
        self.refresh();
    }

    /// Angular step used to trace the outline.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Outline in local space, one vertex per angular step.
    fn outline(&self) -> Vec<Point> {
        let count = (TAU / self.step).ceil() as usize;
        (0..count)
            .map(|i| {
                let angle = i as f64 * self.step;
                Point::new(
                    self.center.x + self.radius_x * angle.cos(),
                    self.center.y + self.radius_y * angle.sin(),
                )
            })
            .collect()
    }

    fn refresh(&mut self) {
        self.display = apply_transform(self.transform.as_ref(), &self.outline());
    }
}

impl Clone for Ellipse {
    fn clone(&self) -> Self {
        Self::with_step(self.center, self.radius_x, self.radius_y, self.transform, self.step)
    }
}

impl PartialEq for Ellipse {
    fn eq(&self, other: &Self) -> bool {
        self.center == other.center
            && self.radius_x == other.radius_x
            && self.radius_y == other.radius_y
            && self.transform == other.transform
    }
}

impl GeometryTrait for Ellipse {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Ellipse
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
                self.center.x += dx;
                self.center.y += dy;
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
                self.radius_x *= factor;
                self.radius_y *= factor;
            }
        }
        self.refresh();
    }

    fn display_points(&self) -> &[Point] {
        &self.display
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        // Test in local space; fall back to the raw point when the transform
        // cannot be inverted.
        let invertible = self.transform.as_ref().and_then(transform::invert).is_some();
        let local = if invertible {
            apply_inverse_transform(self.transform.as_ref(), &[point])[0]
        } else {
            point
        };
        let dx = (local.x - self.center.x) / (self.radius_x + tolerance);
        let dy = (local.y - self.center.y) / (self.radius_y + tolerance);
        dx * dx + dy * dy <= 1.0
    }
}
