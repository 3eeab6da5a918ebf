use std::io;

use uuid::Uuid;

use crate::client::ClientError;
use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("storage pool '{0}' already exists")]
    AlreadyExists(String),
    #[error("\"path\" attribute is required for storage pools of type \"dir\"")]
    MissingPath,
    #[error("non-empty \"source_devices\" attribute is required for storage pools of type \"logical\"")]
    MissingSourceDevices,
    #[error("storage pools of type '{0}' are not supported yet")]
    UnsupportedType(String),
    #[error("unrecognized pool type '{0}'")]
    UnrecognizedType(String),
    #[error("failed to submit storage pool definition: {0}")]
    SubmissionFailed(#[source] ClientError),
    #[error("failed to build storage pool: {0}")]
    BuildFailed(#[source] ClientError),
    #[error("failed to set storage pool autostart: {0}")]
    AutostartFailed(#[source] ClientError),
    #[error("failed to start storage pool: {0}")]
    StartFailed(#[source] ClientError),
    #[error("failed to refresh storage pool: {0}")]
    RefreshFailed(#[source] ClientError),
    #[error("failed to retrieve storage pool id: {0}")]
    IdentifierRetrievalFailed(#[source] ClientError),
    #[error("stylesheet transform failed: {0}")]
    Transform(String),
    #[error("timed out waiting for storage pool {0} to appear")]
    Timeout(Uuid),
    #[error("daemon call failed: {0}")]
    Client(#[from] ClientError),
    #[error("record store issue encountered: {0}")]
    Store(#[from] StoreError),
    #[error("configuration parse failed: {0}")]
    Config(#[from] toml::de::Error),
    #[error("io issue encountered: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
