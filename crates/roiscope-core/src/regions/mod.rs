//! Regions of interest on one image.
//!
//! [`Regions`] owns the shape store, the interaction modes and the region
//! history, and routes every user action through them so that each change
//! is recorded together with its undo step.

mod index;
mod record;
mod store;

pub use index::{SpatialIndex, SpatialIndexStats};
pub use record::{
    Dimensions, ShapeId, ShapeIdError, ShapeProperty, ShapeRecord, ShapeState, ShapeValue,
};
pub use store::{Feature, RegionsStore, pick_priority};

use crate::codec::{self, RoiJson, SaveRequest, SaveResponse, WireObject};
use crate::config::RegionsConfig;
use crate::error::{RegionsError, RegionsResult};
use crate::events::RegionsEvent;
use crate::geometry::{Geometry, GeometryTrait, rect_contains_rect};
use crate::history::{
    GeometryEdit, GeometryEditLog, HistoryAction, HistoryEntry, HistoryRecord, PropertyDiff,
    RegionsHistory,
};
use crate::image::ImageSource;
use crate::modes::{BoxSelect, DragState, Mode, ModeState, ModeTransition};
use crate::service::{RoiService, ServiceResult};
use crate::style::ShapeStyle;
use kurbo::{Point, Rect};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Click tolerance in display pixels.
pub const PICK_TOLERANCE: f64 = 3.0;

/// A save request in flight, with the revision of every shape it carries.
#[derive(Debug, Clone)]
pub struct SaveTicket {
    pub request: SaveRequest,
    revisions: HashMap<ShapeId, u64>,
    deleted: HashSet<ShapeId>,
}

/// The regions of one image.
pub struct Regions<I: ImageSource> {
    image_id: i64,
    image: I,
    config: RegionsConfig,
    store: RegionsStore,
    modes: ModeState,
    history: RegionsHistory,
    edits: GeometryEditLog,
    clipboard: Vec<ShapeRecord>,
    pending_save: Option<SaveTicket>,
    next_hist_id: u64,
    next_shape_id: i64,
    next_roi_id: i64,
}

impl<I: ImageSource> Regions<I> {
    pub fn new(image_id: i64, image: I, config: RegionsConfig) -> Self {
        Self {
            image_id,
            image,
            store: RegionsStore::new(config.index_cell_size),
            history: RegionsHistory::new(config.history_limit),
            config,
            modes: ModeState::new(),
            edits: GeometryEditLog::new(),
            clipboard: Vec::new(),
            pending_save: None,
            next_hist_id: 1,
            next_shape_id: 1,
            next_roi_id: -1,
        }
    }

    pub fn image_id(&self) -> i64 {
        self.image_id
    }

    pub fn image(&self) -> &I {
        &self.image
    }

    /// Mutable access to the image, e.g. to change the current plane.
    pub fn image_mut(&mut self) -> &mut I {
        &mut self.image
    }

    pub fn config(&self) -> &RegionsConfig {
        &self.config
    }

    pub fn store(&self) -> &RegionsStore {
        &self.store
    }

    pub fn modes(&self) -> &ModeState {
        &self.modes
    }

    pub fn history(&self) -> &RegionsHistory {
        &self.history
    }

    /// Drain pending events.
    pub fn poll_events(&mut self) -> Vec<RegionsEvent> {
        self.store.poll_events()
    }

    /// Whether a save request is awaiting its response.
    pub fn save_pending(&self) -> bool {
        self.pending_save.is_some()
    }

    fn next_hist_id(&mut self) -> u64 {
        let id = self.next_hist_id;
        self.next_hist_id += 1;
        id
    }

    fn allocate_roi_id(&mut self) -> i64 {
        let id = self.next_roi_id;
        self.next_roi_id -= 1;
        id
    }

    fn allocate_shape_id(&mut self, roi_id: i64) -> ShapeId {
        let id = ShapeId::new(roi_id, self.next_shape_id);
        self.next_shape_id += 1;
        id
    }

    fn require(&self, mode: Mode) -> RegionsResult<()> {
        if self.modes.is_active(mode) {
            Ok(())
        } else {
            Err(RegionsError::ModeNotActive(mode))
        }
    }

    fn add_history(&mut self, hist_id: u64, action: HistoryAction, records: Vec<HistoryRecord>) {
        let push = self.history.add_history(hist_id, action, records);
        for released in push.released_edits {
            self.edits.release(released);
        }
        if push.created {
            self.store
                .events_mut()
                .push(RegionsEvent::HistoryAdded { hist_id });
        }
    }

    // --- Modes -----------------------------------------------------------

    /// Switch interaction modes.
    pub fn set_modes(&mut self, requested: &[Mode]) -> ModeTransition {
        let transition = self.modes.set_modes(requested);
        if transition.clear_selection {
            self.store.clear_selection();
        }
        if !transition.is_noop() {
            self.store.events_mut().push(RegionsEvent::ModesChanged {
                modes: transition.modes.clone(),
            });
        }
        transition
    }

    // --- Selection -------------------------------------------------------

    /// Select the shape under `point`.
    ///
    /// Without `additive` the previous selection is replaced; with it the
    /// picked shape is toggled.
    pub fn select(&mut self, point: Point, additive: bool) -> RegionsResult<Option<ShapeId>> {
        self.require(Mode::Select)?;
        let hit = self.store.pick(point, PICK_TOLERANCE, &self.image);
        if !additive {
            let others: Vec<ShapeId> = self
                .store
                .selected_ids()
                .into_iter()
                .filter(|id| Some(*id) != hit)
                .collect();
            if !others.is_empty() {
                self.store.set_property(&others, ShapeValue::Selected(false));
            }
        }
        if let Some(id) = hit {
            let selected = self.store.get(&id).is_some_and(|r| r.selected);
            let value = if additive { !selected } else { true };
            if value != selected {
                self.store.set_property(&[id], ShapeValue::Selected(value));
            }
        }
        Ok(hit)
    }

    /// Select every shown shape intersecting `rect`.
    pub fn select_in_box(&mut self, rect: Rect, additive: bool) -> RegionsResult<Vec<ShapeId>> {
        self.require(Mode::Select)?;
        let ids = self.store.ids_in_extent(rect, &self.image);
        if !additive {
            let others: Vec<ShapeId> = self
                .store
                .selected_ids()
                .into_iter()
                .filter(|id| !ids.contains(id))
                .collect();
            if !others.is_empty() {
                self.store.set_property(&others, ShapeValue::Selected(false));
            }
        }
        if !ids.is_empty() {
            self.store.set_property(&ids, ShapeValue::Selected(true));
        }
        Ok(ids)
    }

    /// Start dragging a selection box.
    pub fn begin_box_select(&mut self, point: Point) -> RegionsResult<()> {
        let handler = self
            .modes
            .select_handler_mut()
            .ok_or(RegionsError::ModeNotActive(Mode::Select))?;
        handler.box_select = Some(BoxSelect {
            start: point,
            current: point,
        });
        Ok(())
    }

    pub fn update_box_select(&mut self, point: Point) {
        if let Some(b) = self
            .modes
            .select_handler_mut()
            .and_then(|h| h.box_select.as_mut())
        {
            b.current = point;
        }
    }

    /// Finish the selection box and select what it covers.
    pub fn end_box_select(&mut self, additive: bool) -> RegionsResult<Vec<ShapeId>> {
        let rect = self
            .modes
            .select_handler_mut()
            .and_then(|h| h.box_select.take())
            .map(|b| b.rect())
            .ok_or(RegionsError::ModeNotActive(Mode::Select))?;
        self.select_in_box(rect, additive)
    }

    // --- Translate and modify ----------------------------------------------

    fn translate_shapes(&mut self, hist_id: u64, ids: &[ShapeId], dx: f64, dy: f64) {
        let first_step = self.edits.get(hist_id).is_none();
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(old) = self.store.get(id).map(|r| r.geometry.clone()) else {
                continue;
            };
            let Some(new) = self.store.update_geometry(id, |g| {
                g.translate(dx, dy);
                g.clone()
            }) else {
                continue;
            };
            self.edits.record(hist_id, GeometryEdit { shape_id: *id, old, new });
            moved.push(*id);
        }
        if moved.is_empty() {
            return;
        }
        self.store.mark_modified(&moved);
        self.store
            .events_mut()
            .push(RegionsEvent::GeometryChanged { shapes: moved });
        if first_step {
            self.add_history(hist_id, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id }]);
        }
    }

    /// Move the selected shapes by `(dx, dy)` as one undo step.
    pub fn translate_selected(&mut self, dx: f64, dy: f64) -> RegionsResult<Vec<ShapeId>> {
        self.require(Mode::Translate)?;
        let ids = self.store.selected_ids();
        let hist_id = self.next_hist_id();
        self.translate_shapes(hist_id, &ids, dx, dy);
        Ok(ids)
    }

    /// Start dragging the selected shapes.
    pub fn begin_translate(&mut self, point: Point) -> RegionsResult<()> {
        self.require(Mode::Translate)?;
        let shapes = self.store.selected_ids();
        let hist_id = self.next_hist_id();
        if let Some(handler) = self.modes.translate_handler_mut() {
            handler.drag = Some(DragState {
                hist_id,
                last: point,
                shapes,
            });
        }
        Ok(())
    }

    /// Continue a drag; every step lands in the same undo entry.
    pub fn drag_translate(&mut self, point: Point) -> RegionsResult<()> {
        let drag = self
            .modes
            .translate_handler_mut()
            .and_then(|h| h.drag.as_mut())
            .ok_or(RegionsError::ModeNotActive(Mode::Translate))?;
        let (dx, dy) = (point.x - drag.last.x, point.y - drag.last.y);
        drag.last = point;
        let (hist_id, shapes) = (drag.hist_id, drag.shapes.clone());
        self.translate_shapes(hist_id, &shapes, dx, dy);
        Ok(())
    }

    /// Finish a drag.
    pub fn end_translate(&mut self) {
        if let Some(handler) = self.modes.translate_handler_mut() {
            handler.drag = None;
        }
    }

    /// Replace the geometry of a shape (vertex edit, resize, label rotation).
    pub fn modify_shape(&mut self, id: &ShapeId, geometry: Geometry) -> RegionsResult<()> {
        self.require(Mode::Modify)?;
        let record = self.store.get(id).ok_or(RegionsError::UnknownShape(*id))?;
        if record.kind() != geometry.kind() {
            return Err(RegionsError::KindMismatch {
                expected: record.kind(),
                actual: geometry.kind(),
            });
        }
        let old = record.geometry.clone();
        let hist_id = self.next_hist_id();
        if let Some(handler) = self.modes.modify_handler_mut() {
            handler.editing = Some(*id);
        }
        self.edits.record(hist_id, GeometryEdit {
            shape_id: *id,
            old,
            new: geometry.clone(),
        });
        self.store.update_geometry(id, |g| *g = geometry);
        self.store.mark_modified(&[*id]);
        self.store
            .events_mut()
            .push(RegionsEvent::GeometryChanged { shapes: vec![*id] });
        self.add_history(hist_id, HistoryAction::OlAction, vec![HistoryRecord::OlAction { hist_id }]);
        Ok(())
    }

    // --- Drawing -----------------------------------------------------------

    /// Enter DRAW mode for a shape kind. Shapes of one session share a ROI.
    pub fn start_drawing(&mut self, kind: crate::geometry::ShapeKind) -> ModeTransition {
        let transition = self.set_modes(&[Mode::Draw]);
        let roi_id = self.allocate_roi_id();
        if let Some(handler) = self.modes.draw_handler_mut() {
            handler.kind = Some(kind);
            handler.roi_id = Some(roi_id);
        }
        transition
    }

    /// Leave DRAW mode, returning to the modes active before drawing.
    pub fn finish_drawing(&mut self) -> ModeTransition {
        let prior: Vec<Mode> = self
            .modes
            .draw_handler()
            .map(|h| h.prior_modes.iter().copied().collect())
            .unwrap_or_default();
        self.set_modes(&prior)
    }

    fn plane_in_range(&self, the_z: i32, the_t: i32) -> bool {
        let fits = |dim: i32, count: u32| dim == -1 || (dim >= 0 && (dim as u32) < count);
        fits(the_z, self.image.z_count()) && fits(the_t, self.image.t_count())
    }

    /// Add a drawn shape, copied onto each `(z, t)` plane.
    ///
    /// With no planes the shape goes on the current plane. Planes outside the
    /// image are skipped. `channel` optionally attaches the copies to a channel.
    pub fn draw(
        &mut self,
        geometry: Geometry,
        style: ShapeStyle,
        planes: &[(i32, i32)],
        channel: Option<i32>,
    ) -> RegionsResult<Vec<ShapeId>> {
        self.require(Mode::Draw)?;
        let (kind, session_roi) = self
            .modes
            .draw_handler()
            .map(|h| (h.kind, h.roi_id))
            .unwrap_or_default();
        if let Some(expected) = kind.filter(|k| *k != geometry.kind()) {
            return Err(RegionsError::KindMismatch {
                expected,
                actual: geometry.kind(),
            });
        }
        let roi_id = match session_roi {
            Some(id) => id,
            None => self.allocate_roi_id(),
        };

        let current = [(self.image.current_z() as i32, self.image.current_t() as i32)];
        let planes = if planes.is_empty() { &current[..] } else { planes };
        let mut created = Vec::with_capacity(planes.len());
        for &(the_z, the_t) in planes {
            if !self.plane_in_range(the_z, the_t) {
                log::warn!("Skipping propagation to out-of-range plane z={the_z} t={the_t}");
                continue;
            }
            let id = self.allocate_shape_id(roi_id);
            let mut record = ShapeRecord::new(
                id,
                geometry.clone(),
                style.clone(),
                Dimensions::new(the_z, the_t, channel.unwrap_or(-1)),
            );
            record.state = ShapeState::Added;
            self.store.insert(record);
            created.push(id);
        }
        self.record_generated(&created);
        Ok(created)
    }

    fn record_generated(&mut self, created: &[ShapeId]) {
        if created.is_empty() {
            return;
        }
        let hist_id = self.next_hist_id();
        self.store.events_mut().push(RegionsEvent::ShapesGenerated {
            shapes: created.to_vec(),
        });
        self.add_history(hist_id, HistoryAction::Shapes, vec![HistoryRecord::Shapes {
            shapes: created.to_vec(),
            old_exists: false,
            new_exists: true,
        }]);
    }

    // --- Clipboard ---------------------------------------------------------

    /// Copy the selected shapes. Returns how many were copied.
    pub fn copy_selected(&mut self) -> usize {
        self.clipboard = self
            .store
            .selected_ids()
            .iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect();
        self.clipboard.len()
    }

    /// Paste the clipboard onto the given `(z, t)` planes, or onto the
    /// copied shapes' own planes if none are given.
    ///
    /// Copies that would fall outside the image are skipped.
    pub fn paste(&mut self, planes: &[(i32, i32)]) -> Vec<ShapeId> {
        let image_extent = self.image.extent();
        let clipboard = self.clipboard.clone();
        let mut roi_map: BTreeMap<i64, i64> = BTreeMap::new();
        let mut created = Vec::new();
        for source in &clipboard {
            if !rect_contains_rect(image_extent, source.geometry.bounds()) {
                log::warn!("Skipping paste of {}: outside the image", source.id);
                continue;
            }
            let targets: Vec<(i32, i32)> = if planes.is_empty() {
                vec![(source.dims.the_z, source.dims.the_t)]
            } else {
                planes.to_vec()
            };
            for (the_z, the_t) in targets {
                if !self.plane_in_range(the_z, the_t) {
                    continue;
                }
                let roi_id = match roi_map.get(&source.id.roi_id) {
                    Some(id) => *id,
                    None => {
                        let id = self.allocate_roi_id();
                        roi_map.insert(source.id.roi_id, id);
                        id
                    }
                };
                let id = self.allocate_shape_id(roi_id);
                let mut record = ShapeRecord::new(
                    id,
                    source.geometry.clone(),
                    source.style.clone(),
                    Dimensions::new(the_z, the_t, source.dims.the_c),
                );
                record.state = ShapeState::Added;
                self.store.insert(record);
                created.push(id);
            }
        }
        self.record_generated(&created);
        created
    }

    // --- Properties and deletion --------------------------------------------

    /// Set a property on several shapes as one undo step.
    ///
    /// Visibility and selection changes are not recorded; state changes go
    /// through [`Regions::delete`] and undo.
    pub fn update_properties(&mut self, ids: &[ShapeId], value: ShapeValue) -> Vec<ShapeId> {
        let property = value.property();
        if matches!(
            property,
            ShapeProperty::Visible | ShapeProperty::Selected | ShapeProperty::State
        ) {
            return self.store.set_property(ids, value);
        }
        let records: Vec<HistoryRecord> = ids
            .iter()
            .filter_map(|id| self.store.get(id))
            .filter(|r| r.get(property) != value)
            .map(|r| HistoryRecord::Properties {
                shape_id: r.id,
                diffs: vec![PropertyDiff {
                    old_val: r.get(property),
                    new_val: value.clone(),
                }],
            })
            .collect();
        let changed = self.apply_property(ids, value);
        if !records.is_empty() {
            let hist_id = self.next_hist_id();
            self.add_history(hist_id, HistoryAction::Properties, records);
        }
        changed
    }

    /// Assign a property and keep label boxes in step with their text.
    fn apply_property(&mut self, ids: &[ShapeId], value: ShapeValue) -> Vec<ShapeId> {
        let resize_labels = matches!(value, ShapeValue::Text(_) | ShapeValue::FontSize(_));
        let changed = self.store.set_property(ids, value);
        if resize_labels {
            for id in &changed {
                let Some(record) = self.store.get(id).filter(|r| r.geometry.is_label()) else {
                    continue;
                };
                let size = record.style.font.as_ref().map_or(10.0, |f| f.size);
                let dims = codec::label_extent(record.style.text.as_deref(), size);
                self.store.update_geometry(id, |g| {
                    if let Some(label) = g.as_label_mut() {
                        label.resize(dims);
                    }
                });
            }
        }
        changed
    }

    /// Soft-delete shapes as one undo step.
    pub fn delete(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        let targets: Vec<ShapeId> = ids
            .iter()
            .filter(|id| self.store.get(id).is_some_and(|r| !r.is_removed()))
            .copied()
            .collect();
        if targets.is_empty() {
            return targets;
        }
        self.store
            .set_property(&targets, ShapeValue::State(ShapeState::Removed));
        let hist_id = self.next_hist_id();
        self.add_history(hist_id, HistoryAction::Shapes, vec![HistoryRecord::Shapes {
            shapes: targets.clone(),
            old_exists: true,
            new_exists: false,
        }]);
        targets
    }

    /// Soft-delete the selection.
    pub fn delete_selected(&mut self) -> Vec<ShapeId> {
        let selected = self.store.selected_ids();
        self.delete(&selected)
    }

    // --- Undo and redo -------------------------------------------------------

    /// Revert the latest history entry. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(entry) => {
                self.apply_entry(&entry, true);
                true
            }
            None => false,
        }
    }

    /// Reapply the next history entry. Returns false if there was none.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(entry) => {
                self.apply_entry(&entry, false);
                true
            }
            None => false,
        }
    }

    /// Apply an entry's records in append order.
    fn apply_entry(&mut self, entry: &HistoryEntry, undo: bool) {
        log::debug!(
            "{} history entry {} ({:?})",
            if undo { "Undo" } else { "Redo" },
            entry.hist_id,
            entry.action
        );
        for record in &entry.records {
            match record {
                HistoryRecord::Properties { shape_id, diffs } => {
                    for diff in diffs {
                        let value = if undo { &diff.old_val } else { &diff.new_val };
                        self.apply_property(&[*shape_id], value.clone());
                    }
                }
                HistoryRecord::Shapes {
                    shapes,
                    old_exists,
                    new_exists,
                } => {
                    let exists = if undo { *old_exists } else { *new_exists };
                    let state = if exists {
                        ShapeState::Rollback
                    } else {
                        ShapeState::Removed
                    };
                    self.store.set_property(shapes, ShapeValue::State(state));
                }
                HistoryRecord::OlAction { hist_id } => {
                    let mut changed = Vec::new();
                    for (id, geometry) in self.edits.replay(*hist_id, undo) {
                        if self.store.update_geometry(&id, |g| *g = geometry).is_some() {
                            changed.push(id);
                        } else {
                            log::warn!("Geometry edit {hist_id} refers to missing shape {id}");
                        }
                    }
                    self.store.mark_modified(&changed);
                    if !changed.is_empty() {
                        self.store
                            .events_mut()
                            .push(RegionsEvent::GeometryChanged { shapes: changed });
                    }
                }
            }
        }
    }

    // --- Persistence ---------------------------------------------------------

    /// Serialize dirty shapes without starting a save (clipboard, export).
    pub fn to_wire_object(&self, flatten: bool) -> Option<WireObject> {
        codec::to_wire_object(
            self.store.records(),
            self.config.group_new_shapes_separately,
            flatten,
        )
    }

    /// Build the save request and remember what it carries.
    ///
    /// Local edits may continue while the request is in flight; the response
    /// is applied with [`Regions::apply_save_result`].
    pub fn prepare_save(&mut self) -> RegionsResult<SaveRequest> {
        let Some(WireObject::Grouped(rois)) = self.to_wire_object(false) else {
            return Err(RegionsError::NothingToSave);
        };
        let request = SaveRequest {
            image_id: self.image_id,
            rois,
        };
        let revisions = self
            .store
            .dirty_records()
            .map(|r| (r.id, r.revision()))
            .collect();
        let deleted = self
            .store
            .dirty_records()
            .filter(|r| r.is_removed())
            .map(|r| r.id)
            .collect();
        self.pending_save = Some(SaveTicket {
            request: request.clone(),
            revisions,
            deleted,
        });
        Ok(request)
    }

    /// Apply the server's answer to the pending save.
    ///
    /// Ids are always rewritten. A shape edited after the request was built
    /// keeps its dirty state so the newer edit is saved next time. On failure
    /// every shape keeps its pre-save state.
    pub fn apply_save_result(&mut self, result: ServiceResult<SaveResponse>) -> RegionsResult<()> {
        let ticket = self.pending_save.take().ok_or(RegionsError::NoPendingSave)?;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::error!("Saving regions of image {} failed: {e}", self.image_id);
                self.store
                    .events_mut()
                    .push(RegionsEvent::SaveFailed { message: e.to_string() });
                return Err(e.into());
            }
        };

        let mut renamed = Vec::new();
        let mut purged = Vec::new();
        for (old, new) in &response.ids {
            let (Ok(old), Ok(new)) = (old.parse::<ShapeId>(), new.parse::<ShapeId>()) else {
                log::warn!("Ignoring malformed id pair {old} -> {new}");
                continue;
            };
            let Some(record) = self.store.get(&old) else {
                log::warn!("Save response names unknown shape {old}");
                continue;
            };

            let sent_as_deleted = ticket.deleted.contains(&old);
            if record.is_removed() && sent_as_deleted {
                self.store.purge(&old);
                purged.push(old);
                continue;
            }
            if record.is_removed() {
                // Deleted while its save was in flight: the server has it now,
                // so the deletion goes out with the next save.
                if old != new {
                    self.rename_everywhere(&old, new);
                    renamed.push((old, new));
                }
                if let Some(record) = self.store.record_mut(&new) {
                    record.old_state = Some(ShapeState::Default);
                }
                continue;
            }
            if sent_as_deleted {
                // Deleted on the server but restored locally since: save it again as new.
                let fresh = self.allocate_roi_id();
                let fresh = self.allocate_shape_id(fresh);
                self.rename_everywhere(&old, fresh);
                if let Some(record) = self.store.record_mut(&fresh) {
                    record.state = ShapeState::Added;
                    record.old_state = None;
                }
                continue;
            }

            let edited_since = ticket.revisions.get(&old) != Some(&record.revision());
            if old != new {
                self.rename_everywhere(&old, new);
                renamed.push((old, new));
            }
            if let Some(record) = self.store.record_mut(&new) {
                if edited_since {
                    record.state = ShapeState::Modified;
                } else {
                    record.state = ShapeState::Default;
                    record.old_state = None;
                }
            }
        }
        log::debug!(
            "Save of image {}: {} renamed, {} purged",
            self.image_id,
            renamed.len(),
            purged.len()
        );
        self.store
            .events_mut()
            .push(RegionsEvent::SaveCompleted { ids: renamed, purged });
        Ok(())
    }

    fn rename_everywhere(&mut self, old: &ShapeId, new: ShapeId) {
        self.store.rename(old, new);
        self.history.rename_shape(old, new);
        self.edits.rename_shape(old, new);
    }

    /// Save dirty shapes through a service.
    pub async fn save(&mut self, service: &dyn RoiService) -> RegionsResult<()> {
        let request = self.prepare_save()?;
        let result = service.save_rois(&request).await;
        self.apply_save_result(result)
    }

    /// Replace clean shapes with the server's. Unsaved local edits are kept.
    ///
    /// On failure the store is left as it was.
    pub fn apply_fetch_result(&mut self, result: ServiceResult<Vec<RoiJson>>) -> RegionsResult<usize> {
        let rois = match result {
            Ok(rois) => rois,
            Err(e) => {
                log::error!("Fetching regions of image {} failed: {e}", self.image_id);
                self.store
                    .events_mut()
                    .push(RegionsEvent::FetchFailed { message: e.to_string() });
                return Err(e.into());
            }
        };
        let fetched = codec::decode_rois(&rois, self.config.ellipse_step);
        let clean: Vec<ShapeId> = self
            .store
            .records()
            .filter(|r| !r.is_dirty())
            .map(|r| r.id)
            .collect();
        for id in &clean {
            self.store.purge(id);
        }
        let mut count = 0;
        for record in fetched {
            if self.store.get(&record.id).is_some_and(|r| r.is_dirty()) {
                continue;
            }
            self.store.insert(record);
            count += 1;
        }
        self.store
            .events_mut()
            .push(RegionsEvent::FetchCompleted { count });
        Ok(count)
    }

    /// Fetch the image's shapes through a service.
    pub async fn fetch(&mut self, service: &dyn RoiService) -> RegionsResult<usize> {
        let result = service.fetch_rois(self.image_id).await;
        self.apply_fetch_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Label, PointShape, Rectangle, ShapeKind};
    use crate::image::ImageInfo;
    use crate::service::{MemoryRoiService, ServiceError, block_on};
    use crate::style::RgbaColor;

    fn regions() -> Regions<ImageInfo> {
        Regions::new(
            1,
            ImageInfo::new(1000, 1000).with_planes(3, 2),
            RegionsConfig::default(),
        )
    }

    fn square(x: f64, y: f64) -> Geometry {
        Geometry::Rectangle(Rectangle::new(x, y, 20.0, 20.0))
    }

    fn draw_one(regions: &mut Regions<ImageInfo>, geometry: Geometry) -> ShapeId {
        regions.start_drawing(geometry.kind());
        let ids = regions.draw(geometry, ShapeStyle::default(), &[], None).unwrap();
        regions.finish_drawing();
        ids[0]
    }

    #[test]
    fn test_draw_requires_draw_mode() {
        let mut regions = regions();
        let result = regions.draw(square(0.0, 0.0), ShapeStyle::default(), &[], None);
        assert!(matches!(result, Err(RegionsError::ModeNotActive(Mode::Draw))));
    }

    #[test]
    fn test_draw_kind_mismatch() {
        let mut regions = regions();
        regions.start_drawing(ShapeKind::Ellipse);
        let result = regions.draw(square(0.0, 0.0), ShapeStyle::default(), &[], None);
        assert!(matches!(result, Err(RegionsError::KindMismatch { .. })));
    }

    #[test]
    fn test_draw_propagates_and_skips_out_of_range() {
        let mut regions = regions();
        regions.start_drawing(ShapeKind::Rectangle);
        let ids = regions
            .draw(square(10.0, -10.0), ShapeStyle::default(), &[(0, 0), (2, 1), (5, 0), (0, 9)], Some(1))
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.roi_id == ids[0].roi_id && id.is_unsaved()));
        let second = regions.store().get(&ids[1]).unwrap();
        assert_eq!(second.dims, Dimensions::new(2, 1, 1));
        assert_eq!(second.state, ShapeState::Added);
        assert_eq!(regions.history().len(), 1);
    }

    #[test]
    fn test_finish_drawing_restores_prior_modes() {
        let mut regions = regions();
        regions.set_modes(&[Mode::Translate]);
        regions.start_drawing(ShapeKind::Point);
        assert!(regions.modes().is_active(Mode::Draw));
        regions.finish_drawing();
        assert!(regions.modes().is_active(Mode::Translate));
        assert!(regions.modes().is_active(Mode::Select));
        assert!(!regions.modes().is_active(Mode::Draw));
    }

    #[test]
    fn test_undo_redo_draw() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        let everything = Rect::new(-100.0, -100.0, 100.0, 100.0);

        assert!(regions.undo());
        assert!(regions.store().ids_in_extent(everything, regions.image()).is_empty());
        assert!(regions.to_wire_object(false).is_none());

        assert!(regions.redo());
        assert_eq!(regions.store().ids_in_extent(everything, regions.image()), vec![id]);
        assert_eq!(regions.store().get(&id).unwrap().state, ShapeState::Added);
    }

    #[test]
    fn test_delete_and_undo() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.set_modes(&[Mode::Select]);
        assert_eq!(regions.select(Point::new(10.0, -10.0), false).unwrap(), Some(id));
        assert_eq!(regions.delete_selected(), vec![id]);
        assert!(regions.store().get(&id).unwrap().is_removed());
        assert!(regions.undo());
        assert_eq!(regions.store().get(&id).unwrap().state, ShapeState::Added);
    }

    #[test]
    fn test_translate_drag_is_one_undo_step() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.set_modes(&[Mode::Translate]);
        regions.select(Point::new(10.0, -10.0), false).unwrap();
        let before = regions.history().len();

        regions.begin_translate(Point::new(10.0, -10.0)).unwrap();
        regions.drag_translate(Point::new(15.0, -10.0)).unwrap();
        regions.drag_translate(Point::new(20.0, -5.0)).unwrap();
        regions.end_translate();
        assert_eq!(regions.history().len(), before + 1);

        let corner = |r: &Regions<ImageInfo>| match &r.store().get(&id).unwrap().geometry {
            Geometry::Rectangle(rect) => rect.upper_left_corner(),
            other => panic!("expected rectangle, got {other:?}"),
        };
        assert_eq!(corner(&regions), Point::new(10.0, 5.0));
        assert!(regions.undo());
        assert_eq!(corner(&regions), Point::new(0.0, 0.0));
        assert!(regions.redo());
        assert_eq!(corner(&regions), Point::new(10.0, 5.0));
    }

    #[test]
    fn test_translate_requires_mode() {
        let mut regions = regions();
        assert!(matches!(
            regions.translate_selected(1.0, 1.0),
            Err(RegionsError::ModeNotActive(Mode::Translate))
        ));
    }

    #[test]
    fn test_modify_shape_undo() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.set_modes(&[Mode::Modify]);
        let result = regions.modify_shape(&id, Geometry::Point(PointShape::new(Point::ZERO)));
        assert!(matches!(result, Err(RegionsError::KindMismatch { .. })));

        regions.modify_shape(&id, square(50.0, -50.0)).unwrap();
        assert_eq!(regions.store().get(&id).unwrap().geometry, square(50.0, -50.0));
        regions.undo();
        assert_eq!(regions.store().get(&id).unwrap().geometry, square(0.0, 0.0));
    }

    #[test]
    fn test_discarded_history_releases_geometry_snapshots() {
        let config = RegionsConfig {
            history_limit: 2,
            ..Default::default()
        };
        let mut regions = Regions::new(1, ImageInfo::new(1000, 1000), config);
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.set_modes(&[Mode::Modify]);
        for step in 0..20 {
            regions.modify_shape(&id, square(f64::from(step), 0.0)).unwrap();
        }
        assert_eq!(regions.history().len(), 2);
        assert_eq!(regions.edits.len(), 2);

        regions.undo();
        assert_eq!(regions.store().get(&id).unwrap().geometry, square(18.0, 0.0));
        regions.update_properties(&[id], ShapeValue::TheZ(-1));
        assert_eq!(regions.edits.len(), 1);
        assert!(regions.undo());
        assert!(regions.undo());
        assert_eq!(regions.store().get(&id).unwrap().geometry, square(17.0, 0.0));
        assert!(!regions.undo());
    }

    #[test]
    fn test_visibility_is_not_undoable() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        let before = regions.history().len();
        regions.update_properties(&[id], ShapeValue::Visible(false));
        assert_eq!(regions.history().len(), before);
        assert!(!regions.store().get(&id).unwrap().visible);
    }

    #[test]
    fn test_property_update_undo() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        let red = Some(RgbaColor::new(255, 0, 0, 1.0));
        regions.update_properties(&[id], ShapeValue::StrokeColor(red));
        assert_eq!(regions.store().get(&id).unwrap().style.stroke_color, red);
        regions.undo();
        assert_eq!(regions.store().get(&id).unwrap().style.stroke_color, None);
        regions.redo();
        assert_eq!(regions.store().get(&id).unwrap().style.stroke_color, red);
    }

    #[test]
    fn test_label_text_resizes_box() {
        let mut regions = regions();
        let id = draw_one(&mut regions, Geometry::Label(Label::new(Point::new(5.0, -5.0), 6.0, 10.0)));
        regions.update_properties(&[id], ShapeValue::Text(Some("abcd".to_string())));
        let label = regions.store().get(&id).unwrap().geometry.as_label().cloned().unwrap();
        assert!((label.width() - 24.0).abs() < 1e-9);
        assert_eq!(label.upper_left_corner(), Point::new(5.0, -5.0));
    }

    #[test]
    fn test_deselect_on_leaving_select() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.set_modes(&[Mode::Select, Mode::Modify]);
        regions.select(Point::new(5.0, -5.0), false).unwrap();
        regions.set_modes(&[Mode::Select]);
        assert_eq!(regions.store().selected_ids(), vec![id]);
        regions.set_modes(&[Mode::Default]);
        assert!(regions.store().selected_ids().is_empty());
    }

    #[test]
    fn test_box_select() {
        let mut regions = regions();
        let a = draw_one(&mut regions, square(0.0, 0.0));
        draw_one(&mut regions, square(500.0, -500.0));
        regions.set_modes(&[Mode::Select]);
        regions.begin_box_select(Point::new(-5.0, 5.0)).unwrap();
        regions.update_box_select(Point::new(30.0, -30.0));
        assert_eq!(regions.end_box_select(false).unwrap(), vec![a]);
        assert_eq!(regions.store().selected_ids(), vec![a]);
    }

    #[test]
    fn test_paste_skips_outside_image() {
        let mut regions = regions();
        let inside = draw_one(&mut regions, square(10.0, -10.0));
        let outside = draw_one(&mut regions, square(-50.0, 50.0));
        regions.set_modes(&[Mode::Select]);
        regions.update_properties(&[inside, outside], ShapeValue::Selected(true));
        assert_eq!(regions.copy_selected(), 2);
        let pasted = regions.paste(&[(1, 0), (2, 1)]);
        assert_eq!(pasted.len(), 2);
        assert!(pasted.iter().all(|id| *id != inside && id.is_unsaved()));
    }

    #[test]
    fn test_save_reconciliation() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        assert_eq!(id, ShapeId::new(-1, 1));

        let request = regions.prepare_save().unwrap();
        assert_eq!(request.rois["-1"].shapes.len(), 1);
        let response = SaveResponse {
            ids: BTreeMap::from([("-1:1".to_string(), "5:9".to_string())]),
        };
        regions.apply_save_result(Ok(response)).unwrap();

        let saved = ShapeId::new(5, 9);
        assert_eq!(regions.store().get(&saved).unwrap().state, ShapeState::Default);
        assert!(regions.store().get(&id).is_none());
        assert!(regions.to_wire_object(false).is_none());

        // Undo still reaches the renamed shape.
        assert!(regions.undo());
        assert!(regions.store().get(&saved).unwrap().is_removed());
    }

    #[test]
    fn test_stale_save_keeps_newer_edit_dirty() {
        let mut regions = regions();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        regions.prepare_save().unwrap();
        regions.update_properties(&[id], ShapeValue::TheZ(1));
        let response = SaveResponse {
            ids: BTreeMap::from([("-1:1".to_string(), "5:9".to_string())]),
        };
        regions.apply_save_result(Ok(response)).unwrap();
        let record = regions.store().get(&ShapeId::new(5, 9)).unwrap();
        assert_eq!(record.state, ShapeState::Modified);
        assert_eq!(record.dims.the_z, 1);
    }

    #[test]
    fn test_removed_shape_purged_on_save() {
        let mut regions = regions();
        let service = MemoryRoiService::new();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        block_on(regions.save(&service)).unwrap();
        let saved = regions.store().records().next().unwrap().id;
        assert_ne!(saved, id);

        regions.delete(&[saved]);
        block_on(regions.save(&service)).unwrap();
        assert!(regions.store().is_empty());
        assert!(block_on(service.fetch_rois(1)).unwrap().is_empty());
    }

    #[test]
    fn test_delete_during_inflight_create_is_kept() {
        let mut regions = regions();
        let service = MemoryRoiService::new();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        let request = regions.prepare_save().unwrap();
        regions.delete(&[id]);

        let response = block_on(service.save_rois(&request));
        regions.apply_save_result(response).unwrap();
        let saved = ShapeId::new(1, 1);
        let record = regions.store().get(&saved).unwrap();
        assert!(record.is_removed());
        assert!(regions.store().get(&id).is_none());
        assert_eq!(regions.to_wire_object(false).map(|w| w.shape_count()), Some(1));
        assert_eq!(block_on(service.fetch_rois(1)).unwrap().len(), 1);

        block_on(regions.save(&service)).unwrap();
        assert!(regions.store().is_empty());
        assert!(block_on(service.fetch_rois(1)).unwrap().is_empty());
    }

    #[test]
    fn test_save_failure_keeps_dirty_state() {
        let mut regions = regions();
        let service = MemoryRoiService::new();
        let id = draw_one(&mut regions, square(0.0, 0.0));
        service.set_offline(true);
        let result = block_on(regions.save(&service));
        assert!(matches!(result, Err(RegionsError::Service(ServiceError::Network(_)))));
        assert_eq!(regions.store().get(&id).unwrap().state, ShapeState::Added);
        assert!(!regions.save_pending());
        assert!(matches!(regions.apply_save_result(Ok(SaveResponse::default())), Err(RegionsError::NoPendingSave)));
    }

    #[test]
    fn test_nothing_to_save() {
        let mut regions = regions();
        assert!(matches!(regions.prepare_save(), Err(RegionsError::NothingToSave)));
    }

    #[test]
    fn test_fetch_roundtrip_through_service() {
        let service = MemoryRoiService::new();
        let mut author = regions();
        draw_one(&mut author, square(0.0, 0.0));
        draw_one(&mut author, Geometry::Point(PointShape::new(Point::new(3.0, -3.0))));
        block_on(author.save(&service)).unwrap();

        let mut reader = regions();
        let count = block_on(reader.fetch(&service)).unwrap();
        assert_eq!(count, 2);
        assert!(reader.store().records().all(|r| r.state == ShapeState::Default));

        service.set_offline(true);
        assert!(block_on(reader.fetch(&service)).is_err());
        assert_eq!(reader.store().len(), 2);
        let events = reader.poll_events();
        assert!(matches!(events.last(), Some(RegionsEvent::FetchFailed { .. })));
    }
}
