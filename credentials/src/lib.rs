//! Client-credentials token cache for the marketing-cloud platform.
//!
//! A single [`TokenCache`] is built per process and shared with every save.
//! It hands out the cached access token while it is still inside its
//! validity window and performs one exchange against the platform's auth
//! endpoint otherwise.

pub mod clock;
pub mod config;
pub mod exchange;
pub mod metrics_defs;
pub mod token_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CredentialsConfig;
pub use exchange::{HttpTokenExchange, TokenExchange, TokenGrant};
pub use token_cache::{CachedToken, TokenCache};

use reqwest::StatusCode;
use std::sync::Arc;

/// Cloneable so that callers waiting on the same exchange all receive its
/// outcome.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CredentialsError {
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
    #[error("token exchange rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("token exchange request failed: {0}")]
    Transport(#[source] Arc<reqwest::Error>),
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CredentialsError {
    fn from(err: reqwest::Error) -> Self {
        CredentialsError::Transport(Arc::new(err))
    }
}

impl CredentialsError {
    /// Upstream status code, when the platform answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CredentialsError::Rejected { status, .. } => Some(*status),
            CredentialsError::Transport(e) => e.status(),
            _ => None,
        }
    }
}
