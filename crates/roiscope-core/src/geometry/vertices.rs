//! Vertex list with an optional transform, shared by lines, polylines and polygons.

use super::{apply_transform, bounds_of, finite_or, scale_matrix, translate_matrix};
use kurbo::{Affine, Point};

/// An ordered list of initial coordinates plus their cached display form.
#[derive(Debug)]
pub(crate) struct VertexPath {
    initial: Vec<Point>,
    transform: Option<Affine>,
    display: Vec<Point>,
}

impl VertexPath {
    /// Build from initial coordinates. An empty list becomes a single origin vertex.
    pub(crate) fn new(points: Vec<Point>, transform: Option<Affine>) -> Self {
        let mut initial: Vec<Point> = points
            .into_iter()
            .map(|p| Point::new(finite_or(p.x, 0.0), finite_or(p.y, 0.0)))
            .collect();
        if initial.is_empty() {
            initial.push(Point::ZERO);
        }
        let mut path = Self {
            initial,
            transform,
            display: Vec::new(),
        };
        path.refresh();
        path
    }

    pub(crate) fn initial(&self) -> &[Point] {
        &self.initial
    }

    pub(crate) fn display(&self) -> &[Point] {
        &self.display
    }

    pub(crate) fn transform(&self) -> Option<&Affine> {
        self.transform.as_ref()
    }

    pub(crate) fn set_transform(&mut self, transform: Option<Affine>) {
        self.transform = transform;
        self.refresh();
    }

    pub(crate) fn set_initial(&mut self, points: Vec<Point>) {
        *self = Self::new(points, self.transform);
    }

    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        match &self.transform {
            Some(m) => self.transform = Some(translate_matrix(m, dx, dy)),
            None => {
                for p in &mut self.initial {
                    p.x += dx;
                    p.y += dy;
                }
            }
        }
        self.refresh();
    }

    /// Scale about the center of the initial bounds (or the transform's linear part).
    pub(crate) fn scale(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        match &self.transform {
            Some(m) => self.transform = Some(scale_matrix(m, factor)),
            None => {
                let center = bounds_of(&self.initial).center();
                for p in &mut self.initial {
                    p.x = center.x + (p.x - center.x) * factor;
                    p.y = center.y + (p.y - center.y) * factor;
                }
            }
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        self.display = apply_transform(self.transform.as_ref(), &self.initial);
    }
}

impl Clone for VertexPath {
    fn clone(&self) -> Self {
        // Rebuild from initial coordinates rather than copying the display cache.
        Self::new(self.initial.clone(), self.transform)
    }
}

impl PartialEq for VertexPath {
    fn eq(&self, other: &Self) -> bool {
        self.initial == other.initial && self.transform == other.transform
    }
}
