use crate::CredentialsError;
use crate::config::{ClientCredentials, CredentialsConfig};
use crate::metrics_defs::{TOKEN_EXCHANGE, TOKEN_EXCHANGE_DURATION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{counter, histogram};
use std::time::Instant;

const GRANT_TYPE: &str = "client_credentials";

/// A freshly issued access token and its server-reported lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

/// Performs one client-credentials exchange.
///
/// Implementations must not retry and must not cache; both concerns belong to
/// the caller.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> Result<TokenGrant, CredentialsError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
}

impl<'a> From<ClientCredentials<'a>> for TokenRequest<'a> {
    fn from(credentials: ClientCredentials<'a>) -> Self {
        TokenRequest {
            grant_type: GRANT_TYPE,
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            account_id: credentials.account_id,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Exchanges the configured client credentials at `{auth_base}/v2/token`.
pub struct HttpTokenExchange {
    client: reqwest::Client,
    config: CredentialsConfig,
}

impl HttpTokenExchange {
    /// `client` carries the request timeout shared with the rest of the relay.
    pub fn new(client: reqwest::Client, config: CredentialsConfig) -> Self {
        HttpTokenExchange { client, config }
    }

    async fn request(
        &self,
        url: &str,
        credentials: ClientCredentials<'_>,
    ) -> Result<TokenGrant, CredentialsError> {
        let response = self
            .client
            .post(url)
            .json(&TokenRequest::from(credentials))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(CredentialsError::Rejected { status, body });
        }

        let bytes = response.bytes().await?;
        let parsed: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CredentialsError::MalformedResponse(e.to_string()))?;

        match (parsed.access_token, parsed.expires_in) {
            (Some(access_token), Some(expires_in)) if !access_token.is_empty() => {
                Ok(TokenGrant {
                    access_token,
                    expires_in,
                })
            }
            (None, _) | (Some(_), Some(_)) => Err(CredentialsError::MalformedResponse(
                "missing access_token".into(),
            )),
            (Some(_), None) => Err(CredentialsError::MalformedResponse(
                "missing expires_in".into(),
            )),
        }
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(&self) -> Result<TokenGrant, CredentialsError> {
        // Configuration problems are reported before anything touches the network.
        let credentials = self.config.client_credentials()?;
        let url = self.config.token_url()?;

        let start = Instant::now();
        let result = self.request(&url, credentials).await;
        histogram!(TOKEN_EXCHANGE_DURATION).record(start.elapsed().as_secs_f64());

        match &result {
            Ok(grant) => {
                counter!(TOKEN_EXCHANGE, "result" => "success").increment(1);
                tracing::info!(expires_in = grant.expires_in, "Obtained access token");
            }
            Err(e) => {
                counter!(TOKEN_EXCHANGE, "result" => "failure").increment(1);
                tracing::error!(error = %e, "Token exchange failed");
            }
        }
        result
    }
}
