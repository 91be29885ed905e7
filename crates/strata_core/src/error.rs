//! Error types returned by device operations.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::StatusCode;
use crate::handle::{ArrayHandle, ObjectHandle};
use crate::types::{DataType, ObjectKind};

/// A handle that no longer refers to anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleHandle {
    Object(ObjectHandle),
    Array(ArrayHandle),
}

impl fmt::Display for StaleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleHandle::Object(h) => write!(f, "object {:?}", h),
            StaleHandle::Array(h) => write!(f, "array {:?}", h),
        }
    }
}

/// The validation rule a commit violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitRule {
    #[error("required parameter is not set")]
    MissingRequired,

    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: DataType },

    #[error("array elements must be {expected}, got {found}")]
    ElementTypeMismatch { expected: String, found: DataType },

    #[error("array has {found} elements, expected {expected} to match '{against}'")]
    ArityMismatch {
        expected: usize,
        found: usize,
        against: &'static str,
    },

    #[error("index {value} at element {element} is out of range for {bound} vertices")]
    IndexOutOfRange { element: usize, value: i128, bound: usize },

    #[error("refers to a destroyed {0}")]
    DanglingReference(String),

    #[error("refers to a {found}, expected {expected}")]
    ReferenceKindMismatch { expected: ObjectKind, found: ObjectKind },

    #[error("value {0}")]
    ValueOutOfRange(String),
}

/// A failed commit: which object, which parameter and why.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("commit of {kind} '{name}' failed on '{param}': {rule}")]
pub struct CommitError {
    pub object: ObjectHandle,
    pub kind: ObjectKind,
    pub name: String,
    pub param: String,
    pub rule: CommitRule,
}

/// Errors from the serialization backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported {kind} subtype '{subtype}'")]
    UnsupportedSubtype { kind: ObjectKind, subtype: String },

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("use of released {0}")]
    UseAfterFree(StaleHandle),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("render of frame '{frame}' failed: {message}")]
    RenderFailed { frame: String, message: String },

    #[error("failed to build render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl DeviceError {
    /// Status code reported alongside this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeviceError::InvalidArgument(_) | DeviceError::UnsupportedSubtype { .. } | DeviceError::Commit(_) => {
                StatusCode::InvalidArgument
            }
            DeviceError::UseAfterFree(_) | DeviceError::InvalidState(_) => StatusCode::InvalidOperation,
            DeviceError::RenderFailed { .. } | DeviceError::ThreadPool(_) => StatusCode::UnknownError,
        }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn test_commit_error_message() {
        let err = CommitError {
            object: ObjectHandle::from(KeyData::from_ffi(1)),
            kind: ObjectKind::Geometry,
            name: "glyphs".to_string(),
            param: "vertex.color".to_string(),
            rule: CommitRule::ArityMismatch {
                expected: 4,
                found: 3,
                against: "vertex.position",
            },
        };
        assert_eq!(
            err.to_string(),
            "commit of Geometry 'glyphs' failed on 'vertex.color': \
             array has 3 elements, expected 4 to match 'vertex.position'"
        );
    }

    #[test]
    fn test_status_codes() {
        let stale = DeviceError::UseAfterFree(StaleHandle::Array(ArrayHandle::from(KeyData::from_ffi(1))));
        assert_eq!(stale.status_code(), StatusCode::InvalidOperation);
        assert_eq!(
            DeviceError::InvalidArgument("count".into()).status_code(),
            StatusCode::InvalidArgument
        );
    }
}
