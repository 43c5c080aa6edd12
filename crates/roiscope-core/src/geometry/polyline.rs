//! Line, polyline and polygon geometries.

use super::vertices::VertexPath;
use super::{GeometryTrait, ShapeKind, point_to_polyline_dist, ring_hit_test};
use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};

/// Arrowhead markers at either end of an open path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowMarkers {
    /// Arrowhead at the first vertex.
    pub start: bool,
    /// Arrowhead at the last vertex.
    pub end: bool,
}

/// A straight line segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    path: VertexPath,
    /// Arrowhead markers.
    pub arrows: ArrowMarkers,
}

impl Line {
    /// Create a line between two points.
    pub fn new(start: Point, end: Point) -> Self {
        Self::with_transform(start, end, None)
    }

    /// Create a line with a transform.
    pub fn with_transform(start: Point, end: Point, transform: Option<Affine>) -> Self {
        Self {
            path: VertexPath::new(vec![start, end], transform),
            arrows: ArrowMarkers::default(),
        }
    }

    /// Initial start point.
    pub fn start(&self) -> Point {
        self.path.initial()[0]
    }

    /// Initial end point.
    pub fn end(&self) -> Point {
        let pts = self.path.initial();
        pts[pts.len() - 1]
    }

    /// Initial coordinates.
    pub fn coordinates(&self) -> &[Point] {
        self.path.initial()
    }

    /// Length of the initial segment.
    pub fn length(&self) -> f64 {
        (self.end() - self.start()).hypot()
    }
}

impl GeometryTrait for Line {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Line
    }

    fn transform(&self) -> Option<&Affine> {
        self.path.transform()
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        self.path.set_transform(transform);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.path.translate(dx, dy);
    }

    fn scale(&mut self, factor: f64) {
        self.path.scale(factor);
    }

    fn display_points(&self) -> &[Point] {
        self.path.display()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, self.path.display()) <= tolerance
    }
}

/// An open path through two or more vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    path: VertexPath,
    /// Arrowhead markers.
    pub arrows: ArrowMarkers,
}

impl Polyline {
    /// Create a polyline from initial coordinates.
    pub fn new(points: Vec<Point>) -> Self {
        Self::with_transform(points, None)
    }

    /// Create a polyline with a transform.
    pub fn with_transform(points: Vec<Point>, transform: Option<Affine>) -> Self {
        Self {
            path: VertexPath::new(points, transform),
            arrows: ArrowMarkers::default(),
        }
    }

    /// Initial coordinates.
    pub fn coordinates(&self) -> &[Point] {
        self.path.initial()
    }

    /// Replace the initial coordinates.
    pub fn set_coordinates(&mut self, points: Vec<Point>) {
        self.path.set_initial(points);
    }
}

impl GeometryTrait for Polyline {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polyline
    }

    fn transform(&self) -> Option<&Affine> {
        self.path.transform()
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        self.path.set_transform(transform);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.path.translate(dx, dy);
    }

    fn scale(&mut self, factor: f64) {
        self.path.scale(factor);
    }

    fn display_points(&self) -> &[Point] {
        self.path.display()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, self.path.display()) <= tolerance
    }
}

/// A closed polygon. The ring is stored without repeating the first vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    path: VertexPath,
}

impl Polygon {
    /// Create a polygon from initial ring coordinates.
    pub fn new(points: Vec<Point>) -> Self {
        Self::with_transform(points, None)
    }

    /// Create a polygon with a transform.
    pub fn with_transform(mut points: Vec<Point>, transform: Option<Affine>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self {
            path: VertexPath::new(points, transform),
        }
    }

    /// Initial ring coordinates.
    pub fn coordinates(&self) -> &[Point] {
        self.path.initial()
    }

    /// Replace the initial ring coordinates.
    pub fn set_coordinates(&mut self, points: Vec<Point>) {
        self.path.set_initial(points);
    }
}

impl GeometryTrait for Polygon {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polygon
    }

    fn transform(&self) -> Option<&Affine> {
        self.path.transform()
    }

    fn set_transform(&mut self, transform: Option<Affine>) {
        self.path.set_transform(transform);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.path.translate(dx, dy);
    }

    fn scale(&mut self, factor: f64) {
        self.path.scale(factor);
    }

    fn display_points(&self) -> &[Point] {
        self.path.display()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        ring_hit_test(self.path.display(), point, tolerance)
    }
}
