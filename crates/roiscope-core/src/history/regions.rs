//! Undo/redo of region edits.
//!
//! An entry groups the records produced by one user gesture under a history
//! id. Records come in three shapes: property diffs, shape existence changes,
//! and references to geometry edits kept in a [`GeometryEditLog`].

use super::stack::CommandStack;
use crate::geometry::Geometry;
use crate::regions::{ShapeId, ShapeValue};
use std::collections::HashMap;

/// Kind of action an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryAction {
    Properties,
    Shapes,
    OlAction,
}

/// One property change.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDiff {
    pub old_val: ShapeValue,
    pub new_val: ShapeValue,
}

/// A single undoable change.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryRecord {
    /// Property values of one shape.
    Properties { shape_id: ShapeId, diffs: Vec<PropertyDiff> },
    /// Shapes coming into or going out of existence.
    Shapes {
        shapes: Vec<ShapeId>,
        old_exists: bool,
        new_exists: bool,
    },
    /// A geometry edit whose snapshots live in the [`GeometryEditLog`].
    OlAction { hist_id: u64 },
}

/// One undo step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub hist_id: u64,
    pub action: HistoryAction,
    pub records: Vec<HistoryRecord>,
}

/// Outcome of [`RegionsHistory::add_history`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPush {
    /// A new entry was started rather than appended to the latest one.
    pub created: bool,
    /// Geometry edits referenced only by entries that were discarded.
    pub released_edits: Vec<u64>,
}

/// Undo/redo stack of region edits.
#[derive(Debug, Clone, Default)]
pub struct RegionsHistory {
    stack: CommandStack<HistoryEntry>,
}

impl RegionsHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            stack: CommandStack::new(limit),
        }
    }

    /// Add records under a history id.
    ///
    /// Records with the same id as the latest entry are appended to it.
    pub fn add_history(&mut self, hist_id: u64, action: HistoryAction, records: Vec<HistoryRecord>) -> HistoryPush {
        if records.is_empty() {
            return HistoryPush::default();
        }
        if let Some(top) = self.stack.top_mut().filter(|top| top.hist_id == hist_id) {
            top.records.extend(records);
            return HistoryPush::default();
        }
        log::debug!("History entry {hist_id} ({action:?})");
        let dropped = self.stack.push(HistoryEntry {
            hist_id,
            action,
            records,
        });
        let released_edits = dropped
            .iter()
            .flat_map(|entry| &entry.records)
            .filter_map(|record| match record {
                HistoryRecord::OlAction { hist_id } => Some(*hist_id),
                _ => None,
            })
            .collect();
        HistoryPush {
            created: true,
            released_edits,
        }
    }

    /// Step back; returns the entry to revert.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        self.stack.undo().cloned()
    }

    /// Step forward; returns the entry to reapply.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        self.stack.redo().cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Re-key every record that names `old` after a save renamed the shape.
    pub fn rename_shape(&mut self, old: &ShapeId, new: ShapeId) {
        for entry in self.stack.entries_mut() {
            for record in &mut entry.records {
                match record {
                    HistoryRecord::Properties { shape_id, .. } if shape_id == old => *shape_id = new,
                    HistoryRecord::Shapes { shapes, .. } => {
                        for id in shapes.iter_mut().filter(|id| *id == old) {
                            *id = new;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Before/after geometry of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryEdit {
    pub shape_id: ShapeId,
    pub old: Geometry,
    pub new: Geometry,
}

/// Geometry snapshots of translate and modify gestures, keyed by history id.
#[derive(Debug, Clone, Default)]
pub struct GeometryEditLog {
    edits: HashMap<u64, Vec<GeometryEdit>>,
}

impl GeometryEditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edit. Repeated edits of the same shape under one id keep the
    /// first `old` and the latest `new`.
    pub fn record(&mut self, hist_id: u64, edit: GeometryEdit) {
        let edits = self.edits.entry(hist_id).or_default();
        match edits.iter_mut().find(|e| e.shape_id == edit.shape_id) {
            Some(existing) => existing.new = edit.new,
            None => edits.push(edit),
        }
    }

    /// Drop the snapshots of a history id.
    pub fn release(&mut self, hist_id: u64) {
        self.edits.remove(&hist_id);
    }

    /// Number of history ids with snapshots.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn get(&self, hist_id: u64) -> Option<&[GeometryEdit]> {
        self.edits.get(&hist_id).map(Vec::as_slice)
    }

    /// Geometries to restore for an undo (`undo = true`) or redo.
    pub fn replay(&self, hist_id: u64, undo: bool) -> Vec<(ShapeId, Geometry)> {
        self.get(hist_id)
            .unwrap_or_default()
            .iter()
            .map(|e| (e.shape_id, if undo { e.old.clone() } else { e.new.clone() }))
            .collect()
    }

    /// Re-key snapshots of a renamed shape.
    pub fn rename_shape(&mut self, old: &ShapeId, new: ShapeId) {
        for edit in self.edits.values_mut().flatten() {
            if edit.shape_id == *old {
                edit.shape_id = new;
            }
        }
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GeometryTrait, PointShape};
    use kurbo::Point;

    fn shapes_record(id: ShapeId) -> HistoryRecord {
        HistoryRecord::Shapes {
            shapes: vec![id],
            old_exists: false,
            new_exists: true,
        }
    }

    #[test]
    fn test_same_hist_id_appends() {
        let mut history = RegionsHistory::new(50);
        assert!(history.add_history(1, HistoryAction::Shapes, vec![shapes_record(ShapeId::new(-1, 1))]).created);
        assert!(!history.add_history(1, HistoryAction::Shapes, vec![shapes_record(ShapeId::new(-1, 2))]).created);
        assert_eq!(history.len(), 1);
        assert_eq!(history.undo().unwrap().records.len(), 2);
    }

    #[test]
    fn test_add_add_undo_add_truncates() {
        let mut history = RegionsHistory::new(50);
        history.add_history(1, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id: 1 }]);
        history.add_history(2, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id: 2 }]);
        history.undo();
        let push = history.add_history(3, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id: 3 }]);
        assert_eq!(push.released_edits, vec![2]);
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_eviction_releases_edits() {
        let mut history = RegionsHistory::new(1);
        history.add_history(1, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id: 1 }]);
        let push = history.add_history(2, HistoryAction::Shapes, vec![shapes_record(ShapeId::new(-1, 1))]);
        assert!(push.created);
        assert_eq!(push.released_edits, vec![1]);
    }

    #[test]
    fn test_same_hist_id_after_undo_starts_new_entry() {
        let mut history = RegionsHistory::new(50);
        history.add_history(1, HistoryAction::Shapes, vec![shapes_record(ShapeId::new(-1, 1))]);
        history.undo();
        assert!(history.add_history(1, HistoryAction::Shapes, vec![shapes_record(ShapeId::new(-1, 2))]).created);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_rename_rekeys_records() {
        let mut history = RegionsHistory::new(50);
        let old = ShapeId::new(-1, 1);
        let new = ShapeId::new(5, 9);
        history.add_history(1, HistoryAction::Shapes, vec![shapes_record(old)]);
        history.rename_shape(&old, new);
        let entry = history.undo().unwrap();
        assert_eq!(entry.records[0], shapes_record(new));
    }

    #[test]
    fn test_edit_log_keeps_first_old_latest_new() {
        let mut log = GeometryEditLog::new();
        let id = ShapeId::new(1, 1);
        let at = |x: f64| Geometry::Point(PointShape::new(Point::new(x, 0.0)));
        log.record(7, GeometryEdit { shape_id: id, old: at(0.0), new: at(1.0) });
        log.record(7, GeometryEdit { shape_id: id, old: at(1.0), new: at(2.0) });
        let undo = log.replay(7, true);
        assert_eq!(undo.len(), 1);
        assert_eq!(undo[0].1.display_points()[0], Point::new(0.0, 0.0));
        assert_eq!(log.replay(7, false)[0].1.display_points()[0], Point::new(2.0, 0.0));
        assert!(log.replay(8, true).is_empty());
        log.release(7);
        assert!(log.is_empty());
    }
}
