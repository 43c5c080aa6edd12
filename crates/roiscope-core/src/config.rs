//! Client configuration.

use crate::geometry::DEFAULT_ELLIPSE_STEP;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Default number of undo steps kept per history.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Default spatial index cell size, in image pixels.
pub const DEFAULT_INDEX_CELL_SIZE: f64 = 256.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid configuration: {0}")]
    Parse(String),
    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Settings for a regions session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionsConfig {
    /// Base URL of the image server.
    pub server_url: String,
    /// Give every new shape its own ROI on save instead of one ROI per drawing session.
    pub group_new_shapes_separately: bool,
    /// Angular step (radians) for tracing ellipse outlines.
    pub ellipse_step: f64,
    pub history_limit: usize,
    pub index_cell_size: f64,
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4080".to_string(),
            group_new_shapes_separately: false,
            ellipse_step: DEFAULT_ELLIPSE_STEP,
            history_limit: DEFAULT_HISTORY_LIMIT,
            index_cell_size: DEFAULT_INDEX_CELL_SIZE,
        }
    }
}

impl RegionsConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.server_base()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    fn server_base(&self) -> Result<Url, ConfigError> {
        let mut base = Url::parse(&self.server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    /// URL fetching the ROIs of an image: `<server>/rois?image=<id>`.
    pub fn rois_endpoint(&self, image_id: i64) -> Result<Url, ConfigError> {
        let mut url = self.server_base()?.join("rois")?;
        url.query_pairs_mut().append_pair("image", &image_id.to_string());
        Ok(url)
    }

    /// URL the save request is posted to: `<server>/rois`.
    pub fn save_endpoint(&self) -> Result<Url, ConfigError> {
        Ok(self.server_base()?.join("rois")?)
    }
}
