//! Access to the image server's ROI endpoints.

#[cfg(not(target_arch = "wasm32"))]
mod http;
mod memory;
mod repository;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpRoiService;
pub use memory::MemoryRoiService;
pub use repository::RoiRepository;

use crate::codec::{RoiJson, SaveRequest, SaveResponse};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Image not found: {0}")]
    NotFound(i64),
    #[error("Service error: {0}")]
    Other(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The two ROI endpoints of an image server.
pub trait RoiService: Send + Sync {
    /// `GET /rois?image=<id>`: every ROI of an image.
    fn fetch_rois(&self, image_id: i64) -> BoxFuture<'_, ServiceResult<Vec<RoiJson>>>;

    /// `POST /rois`: persist dirty shapes; returns the old-to-new id map.
    fn save_rois(&self, request: &SaveRequest) -> BoxFuture<'_, ServiceResult<SaveResponse>>;
}

/// Simple blocking executor for tests.
#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
