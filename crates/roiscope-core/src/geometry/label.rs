//! Label geometry: a text box that can be rotated and resized.

use super::{
    GeometryTrait, ShapeKind, apply_transform, extent_or, finite_or, rectangle::Rectangle,
    ring_hit_test, scale_matrix, translate_matrix,
};
use kurbo::{Affine, Point};

/// The unrotated, unscaled box a label was laid out in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelBox {
    /// Upper-left x (text anchor).
    pub x: f64,
    /// Upper-left y (text anchor).
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A text label.
///
/// Rotation and resizing always start from the remembered original box, so
/// reapplying them any number of times gives the same outline.
#[derive(Debug)]
pub struct Label {
    original: LabelBox,
    rotation: f64,
    transform: Option<Affine>,
    display: Vec<Point>,
}

impl Label {
    /// Create a label anchored at `position` with the given text box size.
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self::with_transform(position, width, height, None)
    }

    /// Create a label with a transform.
    pub fn with_transform(position: Point, width: f64, height: f64, transform: Option<Affine>) -> Self {
        let mut label = Self {
            original: LabelBox {
                x: finite_or(position.x, 0.0),
                y: finite_or(position.y, 0.0),
                width: extent_or(width, 1.0),
                height: extent_or(height, 1.0),
            },
            rotation: 0.0,
            transform,
            display: Vec::with_capacity(4),
        };
        label.refresh();
        label
    }

    /// Initial upper-left corner (the text anchor).
    pub fn upper_left_corner(&self) -> Point {
        Point::new(self.original.x, self.original.y)
    }

    /// Width of the original box.
    pub fn width(&self) -> f64 {
        self.original.width
    }

    /// Height of the original box.
    pub fn height(&self) -> f64 {
        self.original.height
    }

    /// The remembered original box.
    pub fn original_box(&self) -> LabelBox {
        self.original
    }

    /// Current rotation in radians (about the anchor).
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Re-derive the outline for a rotation and, optionally, new text dimensions.
    pub fn adjust_coordinates(&mut self, rotation: f64, dims: Option<(f64, f64)>) {
        self.rotation = finite_or(rotation, 0.0);
        if let Some((width, height)) = dims {
            self.original.width = extent_or(width, self.original.width);
            self.original.height = extent_or(height, self.original.height);
        }
        self.refresh();
    }

    /// Resize the text box, keeping the current rotation.
    pub fn resize(&mut self, dims: (f64, f64)) {
        self.adjust_coordinates(self.rotation, Some(dims));
    }

    /// The label's box as a plain rectangle (ignoring rotation).
    pub fn as_rectangle(&self) -> Rectangle {
        Rectangle::with_transform(
            self.original.x,
            self.original.y,
            self.original.width,
            self.original.height,
            self.transform,
        )
    }

    fn refresh(&mut self) {
        let LabelBox { x, y, width, height } = self.original;
        let anchor = Point::new(x, y);
        let rotate = Affine::rotate_about(self.rotation, anchor);
        let corners: Vec<Point> = Rectangle::corners(x, y, width, height)
            .iter()
            .map(|p| rotate * *p)
            .collect();
        self.display = apply_transform(self.transform.as_ref(), &corners);
    }
}

impl Clone for Label {
    fn clone(&self) -> Self {
        let mut label = Self::with_transform(
            Point::new(self.original.x, self.original.y),
            self.original.width,
            self.original.height,
            self.transform,
        );
        label.adjust_coordinates(self.rotation, None);
        label
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.original == other.original
            && self.rotation == other.rotation
            && self.transform == other.transform
    }
}

impl GeometryTrait for Label {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Label
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
                self.original.x += dx;
                self.original.y += dy;
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
                self.original.width *= factor;
                self.original.height *= factor;
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
