use crate::CredentialsError;
use serde::Deserialize;
use std::fmt;
use url::Url;

pub const CLIENT_ID_ENV: &str = "FIELDSYNC_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "FIELDSYNC_CLIENT_SECRET";
pub const SUBDOMAIN_ENV: &str = "FIELDSYNC_SUBDOMAIN";
pub const ACCOUNT_ID_ENV: &str = "FIELDSYNC_ACCOUNT_ID";

const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
const AUTH_HOST_SUFFIX: &str = "auth.marketingcloudapis.com";

fn default_safety_margin_secs() -> u64 {
    DEFAULT_SAFETY_MARGIN_SECS
}

/// Deployment credentials for the client-credentials exchange.
///
/// Every value is optional at load time. Missing values are only reported when
/// a token is actually needed, so a misconfigured deployment still starts and
/// answers each save with a configuration error.
#[derive(Clone, Deserialize, PartialEq)]
pub struct CredentialsConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Tenant subdomain used to build both the auth and REST hosts.
    pub subdomain: Option<String>,
    pub account_id: Option<String>,
    /// Overrides `https://{subdomain}.auth.marketingcloudapis.com`.
    pub auth_base_url: Option<Url>,
    /// Seconds shaved off the server-reported lifetime before a token is
    /// considered expired.
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            client_id: None,
            client_secret: None,
            subdomain: None,
            account_id: None,
            auth_base_url: None,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN_SECS,
        }
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("subdomain", &self.subdomain)
            .field("account_id", &self.account_id)
            .field("auth_base_url", &self.auth_base_url)
            .field("safety_margin_secs", &self.safety_margin_secs)
            .finish()
    }
}

/// Borrowed view of a complete credential set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub subdomain: &'a str,
    pub account_id: Option<&'a str>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CredentialsConfig {
    /// Returns the credential set, or the first missing required value.
    pub fn client_credentials(&self) -> Result<ClientCredentials<'_>, CredentialsError> {
        Ok(ClientCredentials {
            client_id: present(&self.client_id)
                .ok_or(CredentialsError::MissingConfig("client_id"))?,
            client_secret: present(&self.client_secret)
                .ok_or(CredentialsError::MissingConfig("client_secret"))?,
            subdomain: present(&self.subdomain)
                .ok_or(CredentialsError::MissingConfig("subdomain"))?,
            account_id: present(&self.account_id),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.client_credentials().is_ok()
    }

    /// Base URL of the auth host, without a trailing slash.
    pub fn auth_base_url(&self) -> Result<String, CredentialsError> {
        let credentials = self.client_credentials()?;
        Ok(match &self.auth_base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => format!("https://{}.{AUTH_HOST_SUFFIX}", credentials.subdomain),
        })
    }

    pub fn token_url(&self) -> Result<String, CredentialsError> {
        Ok(format!("{}/v2/token", self.auth_base_url()?))
    }

    /// Replaces file values with the ones found through `lookup`.
    ///
    /// `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields = [
            (CLIENT_ID_ENV, &mut self.client_id),
            (CLIENT_SECRET_ENV, &mut self.client_secret),
            (SUBDOMAIN_ENV, &mut self.subdomain),
            (ACCOUNT_ID_ENV, &mut self.account_id),
        ];

        for (name, slot) in fields {
            if let Some(value) = lookup(name) {
                *slot = Some(value);
            }
        }
    }
}
