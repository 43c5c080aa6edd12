//! Roiscope Core Library
//!
//! Regions of interest for a multi-dimensional image viewer: shape geometry,
//! the server wire format, undo/redo histories, interaction modes and the
//! save/fetch round trip.

pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod history;
pub mod image;
pub mod modes;
pub mod regions;
pub mod service;
pub mod style;
pub mod transform;

pub use codec::{RoiJson, SaveRequest, SaveResponse, WireObject};
pub use config::RegionsConfig;
pub use error::{RegionsError, RegionsResult};
pub use events::RegionsEvent;
pub use geometry::{Geometry, GeometryTrait, ShapeKind};
pub use history::{ImageSettings, RegionsHistory, SettingsHistory};
pub use image::{ImageInfo, ImageSource};
pub use modes::{Mode, ModeState};
pub use regions::{Regions, RegionsStore, ShapeId, ShapeRecord, ShapeState, ShapeValue};
#[cfg(not(target_arch = "wasm32"))]
pub use service::HttpRoiService;
pub use service::{MemoryRoiService, RoiService, ServiceError};
pub use style::{RgbaColor, ShapeStyle};
