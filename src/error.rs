use std::sync::Arc;

use thiserror::Error;
use tokio::io;

use crate::types::EntityKind;

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("store returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    IoError(#[from] io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("could not load {kind}: {source}")]
    Fetch {
        kind: EntityKind,
        source: Arc<ServiceError>,
    },
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// True for failures that happened before the store answered.
    pub fn is_transport(&self) -> bool {
        match self {
            ServiceError::Network(_) => true,
            ServiceError::Fetch { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}
