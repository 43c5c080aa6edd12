//! In-memory ROI service.

use super::{BoxFuture, RoiRepository, RoiService, ServiceError, ServiceResult};
use crate::codec::{RoiJson, SaveRequest, SaveResponse};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory ROI service for testing and offline use.
#[derive(Default)]
pub struct MemoryRoiService {
    images: RwLock<HashMap<i64, RoiRepository>>,
    offline: AtomicBool,
}

impl MemoryRoiService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection: every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Preload the ROIs of an image.
    pub fn seed(&self, image_id: i64, rois: Vec<RoiJson>) -> ServiceResult<()> {
        let mut images = self
            .images
            .write()
            .map_err(|e| ServiceError::Other(format!("Lock error: {}", e)))?;
        images.entry(image_id).or_default().seed(rois);
        Ok(())
    }

    fn check_online(&self) -> ServiceResult<()> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(ServiceError::Network("Server unreachable".to_string()));
        }
        Ok(())
    }
}

impl RoiService for MemoryRoiService {
    fn fetch_rois(&self, image_id: i64) -> BoxFuture<'_, ServiceResult<Vec<RoiJson>>> {
        Box::pin(async move {
            self.check_online()?;
            let images = self
                .images
                .read()
                .map_err(|e| ServiceError::Other(format!("Lock error: {}", e)))?;
            Ok(images.get(&image_id).map(RoiRepository::rois).unwrap_or_default())
        })
    }

    fn save_rois(&self, request: &SaveRequest) -> BoxFuture<'_, ServiceResult<SaveResponse>> {
        let request = request.clone();
        Box::pin(async move {
            self.check_online()?;
            let mut images = self
                .images
                .write()
                .map_err(|e| ServiceError::Other(format!("Lock error: {}", e)))?;
            images.entry(request.image_id).or_default().save(&request.rois)
        })
    }
}
