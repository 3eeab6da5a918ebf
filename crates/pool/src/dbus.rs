use async_trait::async_trait;
use uuid::Uuid;
use zbus::zvariant::OwnedObjectPath;
use zbus::{proxy, Connection};

use crate::client::{ClientError, PoolClient, PoolHandle, PoolInfo};

#[proxy(
    interface = "org.libvirt.Connect",
    default_service = "org.libvirt",
    default_path = "/org/libvirt/QEMU"
)]
trait Connect {
    #[zbus(name = "StoragePoolLookupByName")]
    fn storage_pool_lookup_by_name(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "StoragePoolLookupByUUID")]
    fn storage_pool_lookup_by_uuid(&self, uuid: &str) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "StoragePoolDefineXML")]
    fn storage_pool_define_xml(&self, xml: &str, flags: u32) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.libvirt.StoragePool",
    default_service = "org.libvirt",
    assume_defaults = false
)]
trait StoragePool {
    fn build(&self, flags: u32) -> zbus::Result<()>;

    fn create(&self, flags: u32) -> zbus::Result<()>;

    fn refresh(&self, flags: u32) -> zbus::Result<()>;

    fn destroy(&self) -> zbus::Result<()>;

    fn undefine(&self) -> zbus::Result<()>;

    #[zbus(name = "GetXMLDesc")]
    fn get_xml_desc(&self, flags: u32) -> zbus::Result<String>;

    fn get_info(&self) -> zbus::Result<(u32, u64, u64, u64)>;

    #[zbus(property)]
    fn name(&self) -> zbus::Result<String>;

    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn active(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn autostart(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_autostart(&self, autostart: bool) -> zbus::Result<()>;
}

/// [`PoolClient`] speaking to libvirt through its D-Bus interface. Handles
/// are the daemon's object paths.
pub struct DbusPoolClient {
    connection: Connection,
    connect: ConnectProxy<'static>,
}

impl DbusPoolClient {
    pub async fn system() -> Result<Self, ClientError> {
        let connection = Connection::system()
            .await
            .map_err(|err| ClientError::Connection(err.to_string()))?;
        let connect = ConnectProxy::new(&connection)
            .await
            .map_err(|err| ClientError::Connection(err.to_string()))?;
        Ok(DbusPoolClient {
            connection,
            connect,
        })
    }

    async fn pool(&self, handle: &PoolHandle) -> Result<StoragePoolProxy<'static>, ClientError> {
        let path = OwnedObjectPath::try_from(handle.as_str())
            .map_err(|err| ClientError::Call(err.to_string()))?;
        StoragePoolProxy::builder(&self.connection)
            .path(path)
            .map_err(|err| ClientError::Call(err.to_string()))?
            .build()
            .await
            .map_err(|err| ClientError::Call(err.to_string()))
    }
}

// libvirt-dbus surfaces daemon errors as method errors carrying the libvirt
// error text; the missing-pool text is the only way to tell absence apart
// from other failures.
fn map_call_error(err: zbus::Error) -> ClientError {
    match err {
        zbus::Error::MethodError(_, message, _) => {
            let message = message.unwrap_or_default();
            if message.contains("Storage pool not found") {
                ClientError::NotFound
            } else {
                ClientError::Call(message)
            }
        }
        other => ClientError::Call(other.to_string()),
    }
}

#[async_trait]
impl PoolClient for DbusPoolClient {
    async fn lookup_by_name(&self, name: &str) -> Result<PoolHandle, ClientError> {
        let path = self
            .connect
            .storage_pool_lookup_by_name(name)
            .await
            .map_err(map_call_error)?;
        Ok(path.to_string())
    }

    async fn lookup_by_uuid(&self, uuid: Uuid) -> Result<PoolHandle, ClientError> {
        let path = self
            .connect
            .storage_pool_lookup_by_uuid(&uuid.to_string())
            .await
            .map_err(map_call_error)?;
        Ok(path.to_string())
    }

    async fn define(&self, xml: &str) -> Result<PoolHandle, ClientError> {
        let path = self
            .connect
            .storage_pool_define_xml(xml, 0)
            .await
            .map_err(map_call_error)?;
        Ok(path.to_string())
    }

    async fn build(&self, pool: &PoolHandle) -> Result<(), ClientError> {
        self.pool(pool).await?.build(0).await.map_err(map_call_error)
    }

    async fn set_autostart(&self, pool: &PoolHandle, autostart: bool) -> Result<(), ClientError> {
        self.pool(pool)
            .await?
            .set_autostart(autostart)
            .await
            .map_err(|err| ClientError::Call(err.to_string()))
    }

    async fn start(&self, pool: &PoolHandle) -> Result<(), ClientError> {
        self.pool(pool).await?.create(0).await.map_err(map_call_error)
    }

    async fn refresh(&self, pool: &PoolHandle) -> Result<(), ClientError> {
        self.pool(pool).await?.refresh(0).await.map_err(map_call_error)
    }

    async fn destroy(&self, pool: &PoolHandle) -> Result<(), ClientError> {
        self.pool(pool).await?.destroy().await.map_err(map_call_error)
    }

    async fn undefine(&self, pool: &PoolHandle) -> Result<(), ClientError> {
        self.pool(pool).await?.undefine().await.map_err(map_call_error)
    }

    async fn uuid_of(&self, pool: &PoolHandle) -> Result<Uuid, ClientError> {
        let uuid = self
            .pool(pool)
            .await?
            .uuid()
            .await
            .map_err(|err| ClientError::Call(err.to_string()))?;
        Uuid::parse_str(&uuid).map_err(|err| ClientError::Call(err.to_string()))
    }

    async fn name_of(&self, pool: &PoolHandle) -> Result<String, ClientError> {
        self.pool(pool)
            .await?
            .name()
            .await
            .map_err(|err| ClientError::Call(err.to_string()))
    }

    async fn is_active(&self, pool: &PoolHandle) -> Result<bool, ClientError> {
        self.pool(pool)
            .await?
            .active()
            .await
            .map_err(|err| ClientError::Call(err.to_string()))
    }

    async fn xml_desc(&self, pool: &PoolHandle) -> Result<String, ClientError> {
        self.pool(pool)
            .await?
            .get_xml_desc(0)
            .await
            .map_err(map_call_error)
    }

    async fn info(&self, pool: &PoolHandle) -> Result<PoolInfo, ClientError> {
        let (_state, capacity, allocation, available) = self
            .pool(pool)
            .await?
            .get_info()
            .await
            .map_err(map_call_error)?;
        Ok(PoolInfo {
            capacity,
            allocation,
            available,
        })
    }
}
