//! Storage pool provisioning against a virtualization control daemon.
//!
//! The [`controller::PoolController`] drives pools through
//! define/build/autostart/start/refresh against any [`client::PoolClient`]
//! implementation, serializing same-name operations and persisting the
//! daemon-assigned identifier into a local [`store::PoolStore`] record as
//! soon as it is known. [`dbus::DbusPoolClient`] is the production client,
//! speaking to libvirt over its D-Bus interface.

pub mod client;
pub mod config;
pub mod controller;
pub mod dbus;
pub mod definition;
pub mod error;
pub mod store;
pub mod transform;
