//! Uniform-grid spatial index over shape bounds.

use super::ShapeId;
use kurbo::Rect;
use std::collections::{HashMap, HashSet};

/// Extents spanning more cells than this go to the oversized bucket.
const MAX_CELLS_PER_ITEM: i64 = 64;

type Cell = (i64, i64);

/// Index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialIndexStats {
    pub total_items: usize,
    pub occupied_cells: usize,
    pub oversized_items: usize,
}

/// Grid index mapping cells to the shapes whose bounds overlap them.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<Cell, HashSet<ShapeId>>,
    oversized: HashSet<ShapeId>,
    bounds: HashMap<ShapeId, Rect>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 256.0 },
            cells: HashMap::new(),
            oversized: HashSet::new(),
            bounds: HashMap::new(),
        }
    }

    fn cell_range(&self, rect: Rect) -> (Cell, Cell) {
        let to_cell = |v: f64| (v / self.cell_size).floor() as i64;
        (
            (to_cell(rect.x0), to_cell(rect.y0)),
            (to_cell(rect.x1), to_cell(rect.y1)),
        )
    }

    /// Whether a cell range spans more than [`MAX_CELLS_PER_ITEM`] cells.
    ///
    /// Huge coordinates saturate to the ends of the `i64` range, so every
    /// step saturates too.
    fn is_oversized(min: Cell, max: Cell) -> bool {
        let span = |lo: i64, hi: i64| hi.saturating_sub(lo).saturating_add(1);
        span(min.0, max.0).saturating_mul(span(min.1, max.1)) > MAX_CELLS_PER_ITEM
    }

    /// Insert or re-index a shape.
    pub fn insert(&mut self, id: ShapeId, rect: Rect) {
        self.remove(&id);
        let (min, max) = self.cell_range(rect);
        if Self::is_oversized(min, max) {
            self.oversized.insert(id);
        } else {
            for cx in min.0..=max.0 {
                for cy in min.1..=max.1 {
                    self.cells.entry((cx, cy)).or_default().insert(id);
                }
            }
        }
        self.bounds.insert(id, rect);
    }

    /// Remove a shape. Returns whether it was indexed.
    pub fn remove(&mut self, id: &ShapeId) -> bool {
        let Some(rect) = self.bounds.remove(id) else {
            return false;
        };
        if !self.oversized.remove(id) {
            let (min, max) = self.cell_range(rect);
            for cx in min.0..=max.0 {
                for cy in min.1..=max.1 {
                    if let Some(cell) = self.cells.get_mut(&(cx, cy)) {
                        cell.remove(id);
                        if cell.is_empty() {
                            self.cells.remove(&(cx, cy));
                        }
                    }
                }
            }
        }
        true
    }

    /// Shapes whose bounds intersect `extent`, in id order.
    pub fn query(&self, extent: Rect) -> Vec<ShapeId> {
        let mut found: HashSet<ShapeId> = self.oversized.clone();
        let (min, max) = self.cell_range(extent);
        if Self::is_oversized(min, max) {
            found.extend(self.bounds.keys().copied());
        } else {
            for cx in min.0..=max.0 {
                for cy in min.1..=max.1 {
                    if let Some(cell) = self.cells.get(&(cx, cy)) {
                        found.extend(cell.iter().copied());
                    }
                }
            }
        }
        let mut hits: Vec<ShapeId> = found
            .into_iter()
            .filter(|id| self.bounds.get(id).is_some_and(|r| intersects(r, &extent)))
            .collect();
        hits.sort();
        hits
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
        self.bounds.clear();
    }

    pub fn stats(&self) -> SpatialIndexStats {
        SpatialIndexStats {
            total_items: self.bounds.len(),
            occupied_cells: self.cells.len(),
            oversized_items: self.oversized.len(),
        }
    }
}

/// Closed-interval intersection, so zero-sized extents (points) still hit.
fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}
