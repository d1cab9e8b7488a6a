use mv_view_types::{ArgsError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("invalid view definition: {0}")]
    Validation(#[from] ValidationError),
    #[error("model view {name} already defined")]
    AlreadyDefined { name: String },
    #[error("model view {0} not found")]
    NotFound(String),
    #[error(transparent)]
    InvalidArgument(#[from] ArgsError),
    #[error("failed to wrap {callback} for model view {name}: {reason}")]
    Wrap {
        name: String,
        callback: String,
        reason: String,
    },
    #[error("failed to fingerprint model view {name}: {reason}")]
    Fingerprint { name: String, reason: String },
}
