//! Server-side ROI bookkeeping: id assignment and deletion.

use super::{ServiceError, ServiceResult};
use crate::codec::keys::{KEY_ID, KEY_MARKED_FOR_DELETION, KEY_OLD_ID};
use crate::codec::{RoiJson, RoiPayload, SaveResponse};
use crate::regions::ShapeId;
use serde_json::Value;
use std::collections::BTreeMap;

/// The ROIs of one image as the server stores them.
#[derive(Debug, Clone)]
pub struct RoiRepository {
    /// ROI id -> shape id -> wire shape.
    rois: BTreeMap<i64, BTreeMap<i64, Value>>,
    next_roi_id: i64,
    next_shape_id: i64,
}

impl Default for RoiRepository {
    fn default() -> Self {
        Self {
            rois: BTreeMap::new(),
            next_roi_id: 1,
            next_shape_id: 1,
        }
    }
}

impl RoiRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored ROI with its shapes.
    pub fn rois(&self) -> Vec<RoiJson> {
        self.rois
            .iter()
            .map(|(id, shapes)| RoiJson {
                id: *id,
                shapes: shapes.values().cloned().collect(),
            })
            .collect()
    }

    pub fn shape_count(&self) -> usize {
        self.rois.values().map(BTreeMap::len).sum()
    }

    /// Apply a save request.
    ///
    /// New ROIs (negative keys) and new shapes get fresh positive ids. Shapes
    /// marked for deletion are dropped and map to their own id.
    pub fn save(&mut self, rois: &BTreeMap<String, RoiPayload>) -> ServiceResult<SaveResponse> {
        let mut parsed = Vec::with_capacity(rois.len());
        for (key, payload) in rois {
            let roi_id: i64 = key
                .parse()
                .map_err(|_| ServiceError::Serialization(format!("Invalid ROI id: {key}")))?;
            for shape in &payload.shapes {
                let old_id: ShapeId = shape
                    .get(KEY_OLD_ID)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServiceError::Serialization(format!("Shape in ROI {key} has no oldId")))?
                    .parse()
                    .map_err(|e| ServiceError::Serialization(format!("{e}")))?;
                parsed.push((roi_id, old_id, shape));
            }
        }

        let mut response = SaveResponse::default();
        let mut new_rois: BTreeMap<i64, i64> = BTreeMap::new();
        for (roi_id, old_id, shape) in parsed {
            let deleted = shape
                .get(KEY_MARKED_FOR_DELETION)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if deleted {
                if let Some(shapes) = self.rois.get_mut(&old_id.roi_id) {
                    shapes.remove(&old_id.shape_id);
                }
                response.ids.insert(old_id.to_string(), old_id.to_string());
                continue;
            }

            let target_roi = if roi_id < 0 {
                *new_rois.entry(roi_id).or_insert_with(|| {
                    let id = self.next_roi_id;
                    self.next_roi_id += 1;
                    id
                })
            } else {
                self.next_roi_id = self.next_roi_id.max(roi_id + 1);
                roi_id
            };
            let shapes = self.rois.entry(target_roi).or_default();
            let shape_id = match shape.get(KEY_ID).and_then(Value::as_i64) {
                Some(id) if !old_id.is_unsaved() && shapes.contains_key(&id) => id,
                _ => {
                    let id = self.next_shape_id;
                    self.next_shape_id += 1;
                    id
                }
            };

            let mut stored = shape.clone();
            if let Some(map) = stored.as_object_mut() {
                map.remove(KEY_OLD_ID);
                map.remove(KEY_MARKED_FOR_DELETION);
                map.insert(KEY_ID.to_string(), Value::from(shape_id));
            }
            shapes.insert(shape_id, stored);
            response
                .ids
                .insert(old_id.to_string(), ShapeId::new(target_roi, shape_id).to_string());
        }
        self.rois.retain(|_, shapes| !shapes.is_empty());
        Ok(response)
    }

    /// Store fetched-style ROIs directly, keeping their ids.
    pub fn seed(&mut self, rois: Vec<RoiJson>) {
        for roi in rois {
            let shapes = self.rois.entry(roi.id).or_default();
            for shape in roi.shapes {
                if let Some(id) = shape.get(KEY_ID).and_then(Value::as_i64) {
                    self.next_shape_id = self.next_shape_id.max(id + 1);
                    shapes.insert(id, shape);
                }
            }
            self.next_roi_id = self.next_roi_id.max(roi.id + 1);
        }
    }
}
