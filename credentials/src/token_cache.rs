use crate::CredentialsError;
use crate::clock::Clock;
use crate::exchange::TokenExchange;
use crate::metrics_defs::{TOKEN_CACHE_HIT, TOKEN_CACHE_MISS};
use parking_lot::RwLock;
use shared::counter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// An access token together with the instant it stops being handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub token: String,
    pub expires_at_millis: i64,
}

impl CachedToken {
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at_millis
    }
}

/// Process-wide cache holding a single access token.
///
/// The token and its expiry live in one slot and are always replaced
/// together. Refreshes are serialized: callers that queue up behind an
/// exchange receive that exchange's outcome, success or failure, instead of
/// running their own. A caller therefore waits for at most one exchange.
pub struct TokenCache {
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    safety_margin_secs: u64,
    slot: RwLock<Option<CachedToken>>,
    /// Number of finished exchanges. Bumped while `refresh` is held.
    attempts: AtomicU64,
    /// Outcome of the most recent exchange, handed to the callers that waited
    /// for it.
    refresh: Mutex<Option<Result<String, CredentialsError>>>,
}

impl TokenCache {
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        clock: Arc<dyn Clock>,
        safety_margin_secs: u64,
    ) -> Self {
        TokenCache {
            exchange,
            clock,
            safety_margin_secs,
            slot: RwLock::new(None),
            attempts: AtomicU64::new(0),
            refresh: Mutex::new(None),
        }
    }

    /// Returns a usable access token, exchanging credentials only when the
    /// cached one is absent or expired.
    ///
    /// Failed exchanges leave the cache untouched and are not retried.
    pub async fn get_token(&self) -> Result<String, CredentialsError> {
        if let Some(token) = self.valid_token() {
            counter!(TOKEN_CACHE_HIT).increment(1);
            return Ok(token);
        }

        let seen = self.attempts.load(Ordering::SeqCst);
        let mut last_outcome = self.refresh.lock().await;

        // Someone else may have refreshed while we were waiting for the lock.
        if let Some(token) = self.valid_token() {
            counter!(TOKEN_CACHE_HIT).increment(1);
            return Ok(token);
        }
        // An exchange finished while we waited; its outcome answers us too.
        if self.attempts.load(Ordering::SeqCst) != seen
            && let Some(outcome) = last_outcome.as_ref()
        {
            return outcome.clone();
        }
        counter!(TOKEN_CACHE_MISS).increment(1);

        let outcome = self.refresh_token().await;
        *last_outcome = Some(outcome.clone());
        self.attempts.fetch_add(1, Ordering::SeqCst);

        outcome
    }

    async fn refresh_token(&self) -> Result<String, CredentialsError> {
        let requested_at = self.clock.now_millis();
        let grant = self.exchange.exchange().await?;

        let lifetime_secs = grant.expires_in.saturating_sub(self.safety_margin_secs);
        let lifetime_millis = i64::try_from(lifetime_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);

        self.store(CachedToken {
            token: grant.access_token.clone(),
            expires_at_millis: requested_at.saturating_add(lifetime_millis),
        });

        Ok(grant.access_token)
    }

    /// Replaces the cached token.
    pub fn store(&self, token: CachedToken) {
        *self.slot.write() = Some(token);
    }

    /// Snapshot of the slot, whether or not the token is still valid.
    pub fn cached(&self) -> Option<CachedToken> {
        self.slot.read().clone()
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    /// Drops the cached token only if it is still `token`, so a token that a
    /// concurrent caller just refreshed survives.
    pub fn invalidate_token(&self, token: &str) {
        let mut slot = self.slot.write();
        if slot.as_ref().is_some_and(|cached| cached.token == token) {
            *slot = None;
        }
    }

    fn valid_token(&self) -> Option<String> {
        let now = self.clock.now_millis();
        self.slot
            .read()
            .as_ref()
            .filter(|cached| cached.is_valid_at(now))
            .map(|cached| cached.token.clone())
    }
}
