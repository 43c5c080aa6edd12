//! Errors of the regions subsystem.

use crate::geometry::ShapeKind;
use crate::modes::Mode;
use crate::regions::ShapeId;
use crate::service::ServiceError;
use thiserror::Error;

/// Errors returned by regions operations.
#[derive(Debug, Error)]
pub enum RegionsError {
    #[error("Unknown shape: {0}")]
    UnknownShape(ShapeId),
    #[error("Mode {0:?} is not active")]
    ModeNotActive(Mode),
    #[error("Expected a {expected:?} geometry, got {actual:?}")]
    KindMismatch {
        expected: ShapeKind,
        actual: ShapeKind,
    },
    #[error("No save is pending")]
    NoPendingSave,
    #[error("Nothing to save")]
    NothingToSave,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Result type for regions operations.
pub type RegionsResult<T> = Result<T, RegionsError>;
