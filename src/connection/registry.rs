//! Connection registry
//!
//! Lookup of tenant connections by tenant name or alias.

use std::collections::HashMap;

use tracing::debug;

use super::TenantConnection;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection '{name}' not found")]
    ConnectionNotFound { name: String },
    #[error("Connection key '{key}' is already used by tenant '{existing}'")]
    DuplicateKey { key: String, existing: String },
    #[error(
        "Current revision variable '{var_name}' is shared by tenants '{existing}' and '{tenant}'"
    )]
    DuplicateRevisionVar {
        var_name: String,
        existing: String,
        tenant: String,
    },
}

/// Registry of tenant connections addressable by name or alias
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Vec<TenantConnection>,
    index: HashMap<String, usize>,
}

impl ConnectionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its tenant name and, if set, its alias
    pub fn insert(&mut self, connection: TenantConnection) -> Result<(), RegistryError> {
        let keys = lookup_keys(&connection);

        for key in &keys {
            if let Some(&idx) = self.index.get(*key) {
                return Err(RegistryError::DuplicateKey {
                    key: key.to_string(),
                    existing: self.connections[idx].tenant_name().to_string(),
                });
            }
        }

        if let Some(existing) = self.connections.iter().find(|existing| {
            existing.current_revision_id_var_name() == connection.current_revision_id_var_name()
        }) {
            return Err(RegistryError::DuplicateRevisionVar {
                var_name: connection.current_revision_id_var_name().to_string(),
                existing: existing.tenant_name().to_string(),
                tenant: connection.tenant_name().to_string(),
            });
        }

        let idx = self.connections.len();
        for key in keys {
            self.index.insert(key.to_string(), idx);
        }
        debug!(
            tenant = connection.tenant_name(),
            alias = connection.tenant_alias(),
            "registered tenant connection"
        );
        self.connections.push(connection);
        Ok(())
    }

    /// Get a connection by tenant name or alias
    pub fn get(&self, name_or_alias: &str) -> Result<&TenantConnection, RegistryError> {
        self.index
            .get(name_or_alias)
            .map(|&idx| &self.connections[idx])
            .ok_or_else(|| RegistryError::ConnectionNotFound {
                name: name_or_alias.to_string(),
            })
    }

    /// Connections in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TenantConnection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn lookup_keys(connection: &TenantConnection) -> Vec<&str> {
    let mut keys = vec![connection.tenant_name()];
    if let Some(alias) = connection.tenant_alias()
        && !alias.is_empty()
        && alias != connection.tenant_name()
    {
        keys.push(alias);
    }
    keys
}

impl TryFrom<Vec<TenantConnection>> for ConnectionRegistry {
    type Error = RegistryError;

    fn try_from(connections: Vec<TenantConnection>) -> Result<Self, Self::Error> {
        let mut registry = Self::new();
        for connection in connections {
            registry.insert(connection)?;
        }
        Ok(registry)
    }
}
