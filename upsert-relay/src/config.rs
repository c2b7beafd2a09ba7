use crate::errors::RelayError;
use credentials::CredentialsConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DATA_EXTENSION_KEY_ENV: &str = "FIELDSYNC_DATA_EXTENSION_KEY";

const REST_HOST_SUFFIX: &str = "rest.marketingcloudapis.com";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("save_path must start with '/'")]
    InvalidSavePath,

    #[error("limits.max_fields must be greater than 0")]
    ZeroMaxFields,

    #[error("limits.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,

    #[error("upstream_timeout_secs must be greater than 0")]
    ZeroTimeout,
}

fn default_save_path() -> String {
    "/save".into()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for save requests from the widget
    pub listener: Listener,
    /// Listener for health and readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub data_extension: DataExtensionConfig,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default = "default_save_path")]
    pub save_path: String,
    /// Applies to the token exchange and the upsert alike
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.save_path.starts_with('/') {
            return Err(ValidationError::InvalidSavePath);
        }
        if self.limits.max_fields == 0 {
            return Err(ValidationError::ZeroMaxFields);
        }
        if self.limits.max_body_bytes == 0 {
            return Err(ValidationError::ZeroBodyLimit);
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }

    /// Replaces secrets and keys with values found through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.credentials.apply_overrides(&lookup);
        if let Some(key) = lookup(DATA_EXTENSION_KEY_ENV) {
            self.data_extension.external_key = Some(key);
        }
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// The externally managed table rows are written to
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DataExtensionConfig {
    pub external_key: Option<String>,
    /// Overrides `https://{subdomain}.rest.marketingcloudapis.com`.
    pub rest_base_url: Option<Url>,
}

impl DataExtensionConfig {
    pub fn external_key(&self) -> Result<&str, RelayError> {
        self.external_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                RelayError::Config(
                    "missing required configuration: data_extension.external_key".into(),
                )
            })
    }

    /// Bulk upsert endpoint for the configured table.
    pub fn rowset_url(&self, credentials: &CredentialsConfig) -> Result<String, RelayError> {
        let key = self.external_key()?;
        let base = match &self.rest_base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => {
                let subdomain = credentials.client_credentials()?.subdomain;
                format!("https://{subdomain}.{REST_HOST_SUFFIX}")
            }
        };

        Ok(format!("{base}/hub/v1/dataevents/key:{key}/rowset"))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Limits {
    #[serde(default = "Limits::default_max_fields")]
    pub max_fields: usize,
    #[serde(default = "Limits::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Limits {
    fn default_max_fields() -> usize {
        50
    }

    fn default_max_body_bytes() -> usize {
        64 * 1024
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_fields: Self::default_max_fields(),
            max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}
