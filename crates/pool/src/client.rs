use async_trait::async_trait;
use uuid::Uuid;

/// Opaque reference to a daemon-side pool object. The D-Bus client stores an
/// object path here; test doubles are free to use anything string-shaped.
pub type PoolHandle = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolInfo {
    pub capacity: u64,
    pub allocation: u64,
    pub available: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("storage pool not found")]
    NotFound,
    #[error("daemon connection failed: {0}")]
    Connection(String),
    #[error("daemon call failed: {0}")]
    Call(String),
}

/// Operations the lifecycle controller needs from the virtualization daemon.
///
/// Lookup failures must distinguish a missing object ([`ClientError::NotFound`])
/// from every other failure; the controller turns the former into its
/// "absent" signal rather than an error.
#[async_trait]
pub trait PoolClient: Send + Sync {
    async fn lookup_by_name(&self, name: &str) -> Result<PoolHandle, ClientError>;
    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<PoolHandle, ClientError>;
    async fn define(&self, xml: &str) -> Result<PoolHandle, ClientError>;
    async fn build(&self, pool: &PoolHandle) -> Result<(), ClientError>;
    async fn set_autostart(&self, pool: &PoolHandle, autostart: bool) -> Result<(), ClientError>;
    async fn start(&self, pool: &PoolHandle) -> Result<(), ClientError>;
    async fn refresh(&self, pool: &PoolHandle) -> Result<(), ClientError>;
    async fn destroy(&self, pool: &PoolHandle) -> Result<(), ClientError>;
    async fn undefine(&self, pool: &PoolHandle) -> Result<(), ClientError>;
    async fn uuid_of(&self, pool: &PoolHandle) -> Result<Uuid, ClientError>;
    async fn name_of(&self, pool: &PoolHandle) -> Result<String, ClientError>;
    async fn is_active(&self, pool: &PoolHandle) -> Result<bool, ClientError>;
    async fn xml_desc(&self, pool: &PoolHandle) -> Result<String, ClientError>;
    async fn info(&self, pool: &PoolHandle) -> Result<PoolInfo, ClientError>;
}
