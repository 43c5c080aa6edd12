//! The authoritative shape collection of one image.

use super::index::SpatialIndex;
use super::record::{ShapeId, ShapeProperty, ShapeRecord, ShapeState, ShapeValue};
use crate::events::{EventQueue, RegionsEvent};
use crate::geometry::{Geometry, GeometryTrait, rect_contains_rect};
use crate::image::ImageSource;
use kurbo::{Point, Rect};
use std::collections::BTreeMap;

/// A feature returned by a point query.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Shape(ShapeId),
    /// Several shapes drawn as one marker by the renderer.
    Cluster { members: Vec<ShapeId>, extent: Rect },
}

/// Choose one feature among several under the same point.
///
/// A cluster wins if present, else the feature whose extent lies inside
/// another's (innermost), else the first.
pub fn pick_priority(candidates: Vec<(Feature, Rect)>) -> Option<Feature> {
    if let Some(index) = candidates
        .iter()
        .position(|(f, _)| matches!(f, Feature::Cluster { .. }))
    {
        return candidates.into_iter().nth(index).map(|(f, _)| f);
    }
    let innermost = candidates.iter().enumerate().position(|(i, (_, inner))| {
        candidates
            .iter()
            .enumerate()
            .any(|(j, (_, outer))| i != j && rect_contains_rect(*outer, *inner))
    });
    let index = innermost.unwrap_or(0);
    candidates.into_iter().nth(index).map(|(f, _)| f)
}

/// Shape records keyed by composite id, with a spatial index over their
/// display bounds.
#[derive(Debug)]
pub struct RegionsStore {
    records: BTreeMap<ShapeId, ShapeRecord>,
    index: SpatialIndex,
    events: EventQueue,
}

impl RegionsStore {
    pub fn new(cell_size: f64) -> Self {
        Self {
            records: BTreeMap::new(),
            index: SpatialIndex::new(cell_size),
            events: EventQueue::new(),
        }
    }

    /// Add a record, replacing any with the same id.
    pub fn insert(&mut self, record: ShapeRecord) {
        self.index.insert(record.id, record.geometry.bounds());
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: &ShapeId) -> Option<&ShapeRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.records.contains_key(id)
    }

    /// Mutable access for non-geometry fields. Geometry edits go through
    /// [`RegionsStore::update_geometry`] so the index stays current.
    pub(crate) fn record_mut(&mut self, id: &ShapeId) -> Option<&mut ShapeRecord> {
        self.records.get_mut(id)
    }

    /// Mutate a geometry in place and re-index it.
    pub fn update_geometry<R>(&mut self, id: &ShapeId, f: impl FnOnce(&mut Geometry) -> R) -> Option<R> {
        let record = self.records.get_mut(id)?;
        let result = f(&mut record.geometry);
        record.revision += 1;
        self.index.insert(record.id, record.geometry.bounds());
        Some(result)
    }

    /// Physically remove a record.
    pub fn purge(&mut self, id: &ShapeId) -> Option<ShapeRecord> {
        self.index.remove(id);
        self.records.remove(id)
    }

    /// Move a record to a new id.
    pub fn rename(&mut self, old: &ShapeId, new: ShapeId) -> bool {
        let Some(mut record) = self.purge(old) else {
            return false;
        };
        record.id = new;
        self.insert(record);
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in id order, including removed ones.
    pub fn records(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.records.values()
    }

    /// Records that need saving.
    pub fn dirty_records(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.records.values().filter(|r| r.is_dirty())
    }

    /// Ids of the selected shapes.
    pub fn selected_ids(&self) -> Vec<ShapeId> {
        self.records
            .values()
            .filter(|r| r.selected)
            .map(|r| r.id)
            .collect()
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Drain pending events.
    pub fn poll_events(&mut self) -> Vec<RegionsEvent> {
        self.events.poll_events()
    }

    /// Set a property on several shapes at once.
    ///
    /// Returns the ids that were found. One change event covers the whole call.
    pub fn set_property(&mut self, ids: &[ShapeId], value: ShapeValue) -> Vec<ShapeId> {
        let property = value.property();
        let mut changed = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = self.records.get_mut(id) else {
                log::warn!("set_property: unknown shape {id}");
                continue;
            };
            match &value {
                ShapeValue::State(state) => transition_state(record, *state),
                other => {
                    record.assign(other.clone());
                    if property.is_persistent() {
                        transition_state(record, ShapeState::Modified);
                    }
                }
            }
            changed.push(*id);
        }
        if !changed.is_empty() {
            self.events.push(RegionsEvent::PropertiesChanged {
                shapes: changed.clone(),
                property,
            });
        }
        changed
    }

    /// Mark shapes as modified without raising a property event.
    pub(crate) fn mark_modified(&mut self, ids: &[ShapeId]) {
        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                transition_state(record, ShapeState::Modified);
            }
        }
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) -> Vec<ShapeId> {
        let selected = self.selected_ids();
        if selected.is_empty() {
            return selected;
        }
        self.set_property(&selected, ShapeValue::Selected(false))
    }

    fn shows(record: &ShapeRecord, image: &dyn ImageSource) -> bool {
        record.visible
            && !record.is_removed()
            && image.shows(record.dims.the_z, record.dims.the_t, record.dims.the_c)
    }

    /// Visit shapes whose bounds intersect `extent` and that show on the image's
    /// current plane.
    pub fn for_each_in_extent(
        &self,
        extent: Rect,
        image: &dyn ImageSource,
        mut f: impl FnMut(&ShapeRecord),
    ) {
        for id in self.index.query(extent) {
            if let Some(record) = self.records.get(&id).filter(|r| Self::shows(r, image)) {
                f(record);
            }
        }
    }

    /// Ids of the shapes [`RegionsStore::for_each_in_extent`] would visit.
    pub fn ids_in_extent(&self, extent: Rect, image: &dyn ImageSource) -> Vec<ShapeId> {
        let mut ids = Vec::new();
        self.for_each_in_extent(extent, image, |r| ids.push(r.id));
        ids
    }

    /// Features under a point, with optional renderer clusters.
    pub fn pick_with_clusters(
        &self,
        point: Point,
        tolerance: f64,
        image: &dyn ImageSource,
        clusters: &[Feature],
    ) -> Option<Feature> {
        let hit_box = Rect::from_center_size(point, (2.0 * tolerance, 2.0 * tolerance));
        let mut candidates: Vec<(Feature, Rect)> = clusters
            .iter()
            .filter_map(|c| match c {
                Feature::Cluster { extent, .. } if extent.inflate(tolerance, tolerance).contains(point) => {
                    Some((c.clone(), *extent))
                }
                _ => None,
            })
            .collect();
        self.for_each_in_extent(hit_box, image, |record| {
            if record.geometry.hit_test(point, tolerance) {
                candidates.push((Feature::Shape(record.id), record.geometry.bounds()));
            }
        });
        pick_priority(candidates)
    }

    /// The shape under a point.
    pub fn pick(&self, point: Point, tolerance: f64, image: &dyn ImageSource) -> Option<ShapeId> {
        match self.pick_with_clusters(point, tolerance, image, &[])? {
            Feature::Shape(id) => Some(id),
            Feature::Cluster { .. } => None,
        }
    }
}

/// Apply a state transition request.
fn transition_state(record: &mut ShapeRecord, requested: ShapeState) {
    let current = record.state;
    match requested {
        ShapeState::Removed => {
            if current != ShapeState::Removed {
                if record.old_state != Some(ShapeState::Added) {
                    record.old_state = Some(current);
                }
                record.state = ShapeState::Removed;
            }
            record.selected = false;
        }
        ShapeState::Modified => match current {
            // Deferred until the shape comes back.
            ShapeState::Removed => {
                if record.old_state != Some(ShapeState::Added) {
                    record.old_state = Some(ShapeState::Modified);
                }
            }
            ShapeState::Added => {}
            _ => record.state = ShapeState::Modified,
        },
        ShapeState::Rollback => {
            record.state = record.old_state.take().unwrap_or_default();
        }
        ShapeState::Default | ShapeState::Added => {
            record.state = requested;
            record.old_state = None;
        }
    }
    record.revision += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Ellipse, PointShape, Rectangle};
    use crate::image::ImageInfo;
    use crate::regions::Dimensions;
    use crate::style::ShapeStyle;

    fn rect_record(shape_id: i64, x: f64, y: f64, w: f64, h: f64) -> ShapeRecord {
        ShapeRecord::new(
            ShapeId::new(1, shape_id),
            Geometry::Rectangle(Rectangle::new(x, y, w, h)),
            ShapeStyle::default(),
            Dimensions::UNATTACHED,
        )
    }

    fn image() -> ImageInfo {
        ImageInfo::new(1000, 1000).with_planes(3, 2)
    }

    fn everything() -> Rect {
        Rect::new(-2000.0, -2000.0, 2000.0, 2000.0)
    }

    #[test]
    fn test_soft_delete_and_rollback() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 10.0, -10.0, 20.0, 20.0));
        let id = ShapeId::new(1, 1);

        store.set_property(&[id], ShapeValue::State(ShapeState::Removed));
        assert!(store.ids_in_extent(everything(), &image()).is_empty());
        assert!(store.contains(&id));

        store.set_property(&[id], ShapeValue::State(ShapeState::Rollback));
        assert_eq!(store.ids_in_extent(everything(), &image()), vec![id]);
        assert_eq!(store.get(&id).unwrap().state, ShapeState::Default);
    }

    #[test]
    fn test_added_survives_delete_undelete() {
        let mut store = RegionsStore::new(64.0);
        let mut record = rect_record(1, 0.0, 0.0, 5.0, 5.0);
        record.state = ShapeState::Added;
        store.insert(record);
        let id = ShapeId::new(1, 1);

        for _ in 0..2 {
            store.set_property(&[id], ShapeValue::State(ShapeState::Removed));
            store.set_property(&[id], ShapeValue::State(ShapeState::Rollback));
        }
        assert_eq!(store.get(&id).unwrap().state, ShapeState::Added);
        store.set_property(&[id], ShapeValue::State(ShapeState::Modified));
        assert_eq!(store.get(&id).unwrap().state, ShapeState::Added);
    }

    #[test]
    fn test_modified_while_removed_is_deferred() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 0.0, 0.0, 5.0, 5.0));
        let id = ShapeId::new(1, 1);
        store.set_property(&[id], ShapeValue::State(ShapeState::Removed));
        store.set_property(&[id], ShapeValue::State(ShapeState::Modified));
        assert_eq!(store.get(&id).unwrap().state, ShapeState::Removed);
        store.set_property(&[id], ShapeValue::State(ShapeState::Rollback));
        assert_eq!(store.get(&id).unwrap().state, ShapeState::Modified);
    }

    #[test]
    fn test_removal_clears_selection() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 0.0, 0.0, 5.0, 5.0));
        let id = ShapeId::new(1, 1);
        store.set_property(&[id], ShapeValue::Selected(true));
        store.set_property(&[id], ShapeValue::State(ShapeState::Removed));
        assert!(store.selected_ids().is_empty());
    }

    #[test]
    fn test_set_property_batches_one_event() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 0.0, 0.0, 5.0, 5.0));
        store.insert(rect_record(2, 0.0, 0.0, 5.0, 5.0));
        let ids = [ShapeId::new(1, 1), ShapeId::new(1, 2), ShapeId::new(9, 9)];
        let changed = store.set_property(&ids, ShapeValue::TheZ(1));
        assert_eq!(changed.len(), 2);
        let events = store.poll_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            RegionsEvent::PropertiesChanged {
                shapes: changed,
                property: ShapeProperty::TheZ,
            }
        );
        // A persistent edit dirties the shape.
        assert_eq!(store.get(&ids[0]).unwrap().state, ShapeState::Modified);
    }

    #[test]
    fn test_extent_filters_by_plane_and_visibility() {
        let mut store = RegionsStore::new(64.0);
        let mut on_z1 = rect_record(1, 0.0, 0.0, 5.0, 5.0);
        on_z1.dims.the_z = 1;
        store.insert(on_z1);
        store.insert(rect_record(2, 0.0, 0.0, 5.0, 5.0));
        let mut hidden = rect_record(3, 0.0, 0.0, 5.0, 5.0);
        hidden.visible = false;
        store.insert(hidden);

        let mut image = image();
        assert_eq!(store.ids_in_extent(everything(), &image), vec![ShapeId::new(1, 2)]);
        image.current_z = 1;
        assert_eq!(store.ids_in_extent(everything(), &image).len(), 2);
    }

    #[test]
    fn test_pick_prefers_innermost() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 0.0, 100.0, 100.0, 100.0));
        store.insert(rect_record(2, 40.0, 60.0, 20.0, 20.0));
        let image = image();
        assert_eq!(store.pick(Point::new(50.0, 50.0), 1.0, &image), Some(ShapeId::new(1, 2)));
        assert_eq!(store.pick(Point::new(10.0, 90.0), 1.0, &image), Some(ShapeId::new(1, 1)));
        assert_eq!(store.pick(Point::new(500.0, 500.0), 1.0, &image), None);
    }

    #[test]
    fn test_pick_prefers_cluster() {
        let mut store = RegionsStore::new(64.0);
        store.insert(ShapeRecord::new(
            ShapeId::new(1, 1),
            Geometry::Point(PointShape::new(Point::new(5.0, 5.0))),
            ShapeStyle::default(),
            Dimensions::UNATTACHED,
        ));
        let cluster = Feature::Cluster {
            members: vec![ShapeId::new(1, 1)],
            extent: Rect::new(0.0, 0.0, 10.0, 10.0),
        };
        let picked = store.pick_with_clusters(Point::new(5.0, 5.0), 1.0, &image(), &[cluster.clone()]);
        assert_eq!(picked, Some(cluster));
    }

    #[test]
    fn test_update_geometry_reindexes() {
        let mut store = RegionsStore::new(64.0);
        store.insert(ShapeRecord::new(
            ShapeId::new(1, 1),
            Geometry::Ellipse(Ellipse::circle(Point::ZERO, 5.0)),
            ShapeStyle::default(),
            Dimensions::UNATTACHED,
        ));
        let id = ShapeId::new(1, 1);
        store.update_geometry(&id, |g| g.translate(500.0, 0.0));
        let image = image();
        assert!(store.ids_in_extent(Rect::new(-6.0, -6.0, 6.0, 6.0), &image).is_empty());
        assert_eq!(store.ids_in_extent(Rect::new(490.0, -6.0, 510.0, 6.0), &image), vec![id]);
    }

    #[test]
    fn test_rename_moves_record() {
        let mut store = RegionsStore::new(64.0);
        store.insert(rect_record(1, 0.0, 0.0, 5.0, 5.0));
        assert!(store.rename(&ShapeId::new(1, 1), ShapeId::new(5, 9)));
        assert!(store.get(&ShapeId::new(1, 1)).is_none());
        assert_eq!(store.get(&ShapeId::new(5, 9)).unwrap().id, ShapeId::new(5, 9));
        assert!(!store.rename(&ShapeId::new(1, 1), ShapeId::new(6, 6)));
    }
    #[test]
    fn test_insert_decoded_shape_with_huge_extent() {
        let wire = serde_json::json!({
            "@type": "#Rectangle", "@id": 1,
            "X": -1e300, "Y": 0.0, "Width": 2e300, "Height": 1.0
        });
        let record = crate::codec::decode_shape(1, &wire).unwrap();
        let mut store = RegionsStore::new(256.0);
        store.insert(record);
        assert_eq!(store.ids_in_extent(everything(), &image()), vec![ShapeId::new(1, 1)]);
        assert!(store.purge(&ShapeId::new(1, 1)).is_some());
    }
}
