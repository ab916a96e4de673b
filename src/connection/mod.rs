//! Tenant connection descriptor
//!
//! A [`TenantConnection`] holds everything needed to reach a single Benchling
//! tenant: API client credentials, the warehouse connection string, internal
//! API admin credentials, the registry to use and the name of the variable
//! tracking the tenant's current revision.
//!
//! Descriptors are built from raw key/value data through an explicit factory
//! ([`TenantConnection::from_values`] or `TryFrom<RawTenantConnection>`) and
//! are immutable afterwards.

pub mod identifier;
pub mod registry;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::secret::SecretString;

pub use identifier::{
    CURRENT_REVISION_ID_SUFFIX, derive_revision_var_name, is_reserved_keyword,
    sanitize_identifier, validate_identifier,
};
pub use registry::{ConnectionRegistry, RegistryError};

/// Domain under which every tenant is hosted, as `{tenant_name}.benchling.com`
pub const TENANT_DOMAIN: &str = "benchling.com";

/// Errors raised while building a connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("Invalid variable name: {name}")]
    InvalidIdentifier { name: String },
    #[error("tenant name '{tenant_name}' does not form a valid tenant URL: {reason}")]
    InvalidTenantUrl { tenant_name: String, reason: String },
}

/// Unvalidated connection fields as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawTenantConnection {
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_alias: Option<String>,
    #[serde(default)]
    pub current_revision_id_var_name: Option<String>,
    #[serde(default)]
    pub api_client_id: Option<String>,
    #[serde(default)]
    pub api_client_secret: Option<String>,
    #[serde(default)]
    pub warehouse_connection_string: Option<String>,
    #[serde(default)]
    pub internal_api_admin_email: Option<String>,
    #[serde(default)]
    pub internal_api_admin_password: Option<String>,
    #[serde(default)]
    pub registry_id: Option<String>,
}

impl RawTenantConnection {
    /// Set a field by name, returning `false` when the name is not a known field.
    ///
    /// Field names are matched case-insensitively so that environment-style
    /// keys (`TENANT_NAME`) work as well as snake case ones.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key.to_ascii_lowercase().as_str() {
            "tenant_name" => &mut self.tenant_name,
            "tenant_alias" => &mut self.tenant_alias,
            "current_revision_id_var_name" => &mut self.current_revision_id_var_name,
            "api_client_id" => &mut self.api_client_id,
            "api_client_secret" => &mut self.api_client_secret,
            "warehouse_connection_string" => &mut self.warehouse_connection_string,
            "internal_api_admin_email" => &mut self.internal_api_admin_email,
            "internal_api_admin_password" => &mut self.internal_api_admin_password,
            "registry_id" => &mut self.registry_id,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }
}

/// Validated connection information for a Benchling tenant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTenantConnection")]
pub struct TenantConnection {
    tenant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_alias: Option<String>,
    current_revision_id_var_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_client_secret: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse_connection_string: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_api_admin_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_api_admin_password: Option<SecretString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_id: Option<String>,
}

impl TryFrom<RawTenantConnection> for TenantConnection {
    type Error = ConnectionError;

    fn try_from(raw: RawTenantConnection) -> Result<Self, Self::Error> {
        let tenant_name = raw.tenant_name.ok_or(ConnectionError::MissingField {
            field: "tenant_name",
        })?;
        let base = naming_base(&tenant_name, raw.tenant_alias.as_deref());

        // Caller-supplied names are stored as given; only derived ones are checked
        let current_revision_id_var_name = match raw.current_revision_id_var_name {
            Some(name) if !name.is_empty() => name,
            _ => {
                let derived = derive_revision_var_name(base)?;
                debug!(
                    tenant = %base,
                    var_name = %derived,
                    "derived current revision variable name"
                );
                derived
            }
        };

        Ok(Self {
            tenant_name,
            tenant_alias: raw.tenant_alias,
            current_revision_id_var_name,
            api_client_id: raw.api_client_id,
            api_client_secret: raw.api_client_secret.map(SecretString::from),
            warehouse_connection_string: raw.warehouse_connection_string.map(SecretString::from),
            internal_api_admin_email: raw.internal_api_admin_email,
            internal_api_admin_password: raw.internal_api_admin_password.map(SecretString::from),
            registry_id: raw.registry_id,
        })
    }
}

fn naming_base<'a>(tenant_name: &'a str, tenant_alias: Option<&'a str>) -> &'a str {
    match tenant_alias {
        Some(alias) if !alias.is_empty() => alias,
        _ => tenant_name,
    }
}

impl TenantConnection {
    /// Build a descriptor from field name / value pairs.
    ///
    /// Unknown keys are ignored.
    pub fn from_values<I, K, V>(values: I) -> Result<Self, ConnectionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawTenantConnection::default();
        for (key, value) in values {
            let key = key.as_ref();
            if !raw.set(key, value) {
                debug!(key = %key, "ignoring unknown connection field");
            }
        }
        Self::try_from(raw)
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    pub fn tenant_alias(&self) -> Option<&str> {
        self.tenant_alias.as_deref()
    }

    /// Name of the variable holding the tenant's current revision ID
    pub fn current_revision_id_var_name(&self) -> &str {
        &self.current_revision_id_var_name
    }

    pub fn api_client_id(&self) -> Option<&str> {
        self.api_client_id.as_deref()
    }

    pub fn api_client_secret(&self) -> Option<&SecretString> {
        self.api_client_secret.as_ref()
    }

    pub fn warehouse_connection_string(&self) -> Option<&SecretString> {
        self.warehouse_connection_string.as_ref()
    }

    pub fn internal_api_admin_email(&self) -> Option<&str> {
        self.internal_api_admin_email.as_deref()
    }

    pub fn internal_api_admin_password(&self) -> Option<&SecretString> {
        self.internal_api_admin_password.as_ref()
    }

    /// Registry to use; required by callers when the tenant has several registries
    pub fn registry_id(&self) -> Option<&str> {
        self.registry_id.as_deref()
    }

    /// Alias if set and non-empty, otherwise the tenant name
    pub fn display_name(&self) -> &str {
        naming_base(&self.tenant_name, self.tenant_alias.as_deref())
    }

    /// Base URL of the tenant, `https://{tenant_name}.benchling.com/`
    pub fn tenant_url(&self) -> Result<Url, ConnectionError> {
        let host = format!("{}.{}", self.tenant_name, TENANT_DOMAIN);
        let url = Url::parse(&format!("https://{host}/")).map_err(|err| {
            ConnectionError::InvalidTenantUrl {
                tenant_name: self.tenant_name.clone(),
                reason: err.to_string(),
            }
        })?;

        // A name containing '/', '@' or similar parses but moves the host
        if url.host_str() != Some(host.to_ascii_lowercase().as_str()) {
            return Err(ConnectionError::InvalidTenantUrl {
                tenant_name: self.tenant_name.clone(),
                reason: format!("host resolves to {:?}", url.host_str()),
            });
        }
        Ok(url)
    }

    /// API client ID and secret, when both are configured
    pub fn api_credentials(&self) -> Option<(&str, &SecretString)> {
        Some((self.api_client_id.as_deref()?, self.api_client_secret.as_ref()?))
    }

    /// Internal API admin email and password, when both are configured
    pub fn internal_api_credentials(&self) -> Option<(&str, &SecretString)> {
        Some((
            self.internal_api_admin_email.as_deref()?,
            self.internal_api_admin_password.as_ref()?,
        ))
    }

    pub fn has_warehouse(&self) -> bool {
        self.warehouse_connection_string.is_some()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.redacted_value()?)
    }

    pub(crate) fn redacted_value(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(fields) = value.as_object_mut() {
            for field in [
                "api_client_id",
                "api_client_secret",
                "warehouse_connection_string",
                "internal_api_admin_password",
            ] {
                if let Some(slot) = fields.get_mut(field) {
                    *slot = serde_json::Value::String(SecretString::redacted().to_string());
                }
            }
        }
        Ok(value)
    }
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("tenant_name", &self.tenant_name)
            .field("tenant_alias", &self.tenant_alias)
            .field(
                "current_revision_id_var_name",
                &self.current_revision_id_var_name,
            )
            .field(
                "api_client_id",
                &self.api_client_id.as_ref().map(|_| SecretString::redacted()),
            )
            .field("api_client_secret", &self.api_client_secret)
            .field(
                "warehouse_connection_string",
                &self.warehouse_connection_string,
            )
            .field("internal_api_admin_email", &self.internal_api_admin_email)
            .field(
                "internal_api_admin_password",
                &self.internal_api_admin_password,
            )
            .field("registry_id", &self.registry_id)
            .finish()
    }
}
