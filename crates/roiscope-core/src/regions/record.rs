//! Shape records: a geometry plus style, plane attachment and edit state.

use crate::geometry::{Geometry, GeometryTrait, ShapeKind};
use crate::style::{RgbaColor, ShapeStyle, StrokeWidth};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Composite shape identifier `"<roiId>:<shapeId>"`.
///
/// A negative ROI id marks a shape that has not been saved yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeId {
    pub roi_id: i64,
    pub shape_id: i64,
}

impl ShapeId {
    pub fn new(roi_id: i64, shape_id: i64) -> Self {
        Self { roi_id, shape_id }
    }

    /// Check if the shape has never been persisted.
    pub fn is_unsaved(&self) -> bool {
        self.roi_id < 0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.roi_id, self.shape_id)
    }
}

/// Error parsing a composite shape id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid shape id: {0}")]
pub struct ShapeIdError(pub String);

impl FromStr for ShapeId {
    type Err = ShapeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (roi, shape) = s.split_once(':').ok_or_else(|| ShapeIdError(s.to_string()))?;
        let roi_id = roi.trim().parse().map_err(|_| ShapeIdError(s.to_string()))?;
        let shape_id = shape.trim().parse().map_err(|_| ShapeIdError(s.to_string()))?;
        Ok(Self { roi_id, shape_id })
    }
}

impl TryFrom<String> for ShapeId {
    type Error = ShapeIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShapeId> for String {
    fn from(id: ShapeId) -> Self {
        id.to_string()
    }
}

/// Persistence state of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShapeState {
    /// In sync with the server.
    #[default]
    Default,
    /// Changed since the last save.
    Modified,
    /// Created locally, not yet saved.
    Added,
    /// Soft-deleted; purged on save.
    Removed,
    /// Transition request only: revert to the remembered previous state.
    Rollback,
}

/// Plane attachment. `-1` means "unattached / applies to all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub the_z: i32,
    pub the_t: i32,
    pub the_c: i32,
}

impl Dimensions {
    /// Unattached in every dimension.
    pub const UNATTACHED: Dimensions = Dimensions {
        the_z: -1,
        the_t: -1,
        the_c: -1,
    };

    pub fn new(the_z: i32, the_t: i32, the_c: i32) -> Self {
        Self { the_z, the_t, the_c }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::UNATTACHED
    }
}

/// Names of the editable shape properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeProperty {
    Visible,
    Selected,
    State,
    FillColor,
    StrokeColor,
    StrokeWidth,
    Text,
    FontSize,
    TheZ,
    TheT,
    TheC,
}

impl ShapeProperty {
    /// Whether a change to this property must be persisted.
    pub fn is_persistent(&self) -> bool {
        !matches!(
            self,
            ShapeProperty::Visible | ShapeProperty::Selected | ShapeProperty::State
        )
    }
}

/// A typed value of one shape property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeValue {
    Visible(bool),
    Selected(bool),
    State(ShapeState),
    FillColor(Option<RgbaColor>),
    StrokeColor(Option<RgbaColor>),
    StrokeWidth(Option<StrokeWidth>),
    Text(Option<String>),
    FontSize(f64),
    TheZ(i32),
    TheT(i32),
    TheC(i32),
}

impl ShapeValue {
    /// The property this value belongs to.
    pub fn property(&self) -> ShapeProperty {
        match self {
            ShapeValue::Visible(_) => ShapeProperty::Visible,
            ShapeValue::Selected(_) => ShapeProperty::Selected,
            ShapeValue::State(_) => ShapeProperty::State,
            ShapeValue::FillColor(_) => ShapeProperty::FillColor,
            ShapeValue::StrokeColor(_) => ShapeProperty::StrokeColor,
            ShapeValue::StrokeWidth(_) => ShapeProperty::StrokeWidth,
            ShapeValue::Text(_) => ShapeProperty::Text,
            ShapeValue::FontSize(_) => ShapeProperty::FontSize,
            ShapeValue::TheZ(_) => ShapeProperty::TheZ,
            ShapeValue::TheT(_) => ShapeProperty::TheT,
            ShapeValue::TheC(_) => ShapeProperty::TheC,
        }
    }
}

/// A shape as held by the regions store.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub id: ShapeId,
    pub geometry: Geometry,
    pub style: ShapeStyle,
    pub dims: Dimensions,
    pub state: ShapeState,
    /// State to return to on rollback.
    pub old_state: Option<ShapeState>,
    pub visible: bool,
    pub selected: bool,
    /// Bumped on every mutation; used to detect edits made while a save is in flight.
    pub(crate) revision: u64,
}

impl ShapeRecord {
    /// Create a record in the default (persisted) state.
    pub fn new(id: ShapeId, geometry: Geometry, style: ShapeStyle, dims: Dimensions) -> Self {
        Self {
            id,
            geometry,
            style,
            dims,
            state: ShapeState::Default,
            old_state: None,
            visible: true,
            selected: false,
            revision: 0,
        }
    }

    /// The shape kind.
    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    /// Check if the record needs saving.
    pub fn is_dirty(&self) -> bool {
        self.state != ShapeState::Default
    }

    /// Check if the record is soft-deleted.
    pub fn is_removed(&self) -> bool {
        self.state == ShapeState::Removed
    }

    /// Check if the shape was created and deleted without ever being saved.
    pub fn is_discarded(&self) -> bool {
        self.is_removed() && (self.old_state == Some(ShapeState::Added) || self.id.is_unsaved())
    }

    /// Mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read the current value of a property.
    pub fn get(&self, property: ShapeProperty) -> ShapeValue {
        match property {
            ShapeProperty::Visible => ShapeValue::Visible(self.visible),
            ShapeProperty::Selected => ShapeValue::Selected(self.selected),
            ShapeProperty::State => ShapeValue::State(self.state),
            ShapeProperty::FillColor => ShapeValue::FillColor(self.style.fill_color),
            ShapeProperty::StrokeColor => ShapeValue::StrokeColor(self.style.stroke_color),
            ShapeProperty::StrokeWidth => ShapeValue::StrokeWidth(self.style.stroke_width.clone()),
            ShapeProperty::Text => ShapeValue::Text(self.style.text.clone()),
            ShapeProperty::FontSize => {
                ShapeValue::FontSize(self.style.font.as_ref().map_or(0.0, |f| f.size))
            }
            ShapeProperty::TheZ => ShapeValue::TheZ(self.dims.the_z),
            ShapeProperty::TheT => ShapeValue::TheT(self.dims.the_t),
            ShapeProperty::TheC => ShapeValue::TheC(self.dims.the_c),
        }
    }

    /// Assign a plain (non-state) property value.
    ///
    /// State transitions have their own rules and go through the store.
    pub(crate) fn assign(&mut self, value: ShapeValue) {
        match value {
            ShapeValue::Visible(v) => {
                self.visible = v;
                if !v {
                    self.selected = false;
                }
            }
            ShapeValue::Selected(v) => self.selected = v && !self.is_removed(),
            ShapeValue::State(s) => self.state = s,
            ShapeValue::FillColor(c) => self.style.fill_color = c,
            ShapeValue::StrokeColor(c) => self.style.stroke_color = c,
            ShapeValue::StrokeWidth(w) => self.style.stroke_width = w,
            ShapeValue::Text(t) => self.style.text = t,
            ShapeValue::FontSize(size) => {
                let font = self.style.font.get_or_insert_with(Default::default);
                if size.is_finite() && size > 0.0 {
                    font.size = size;
                }
            }
            ShapeValue::TheZ(z) => self.dims.the_z = z,
            ShapeValue::TheT(t) => self.dims.the_t = t,
            ShapeValue::TheC(c) => self.dims.the_c = c,
        }
        self.revision += 1;
    }
}
