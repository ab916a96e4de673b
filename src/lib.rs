//! # Liminal Connections
//!
//! Validated connection descriptors for Benchling tenants, the layered
//! configuration loader that builds them, and logging setup.

pub mod config;
pub mod connection;
pub mod secret;
pub mod telemetry;

pub use config::{ConfigError, ConfigLoader, LiminalConfig};
pub use connection::{
    ConnectionError, ConnectionRegistry, RawTenantConnection, RegistryError, TenantConnection,
};
pub use secret::SecretString;
