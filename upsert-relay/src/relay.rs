use crate::config::{Config, DataExtensionConfig};
use crate::errors::RelayError;
use crate::metrics_defs::{ROWS_SUBMITTED, SAVE_DURATION, SAVE_REQUESTS};
use crate::model::{SaveRequest, SaveResult, format_entry_timestamp};
use crate::payload::build_rowset;
use crate::rowset::RowsetClient;
use credentials::{Clock, CredentialsConfig, HttpTokenExchange, SystemClock, TokenCache};
use hyper::StatusCode;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Stage a save has reached. A failed save reports the stage it failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Validating,
    Authenticating,
    BuildingPayload,
    Submitting,
    Done,
}

impl SavePhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SavePhase::Validating => "validating",
            SavePhase::Authenticating => "authenticating",
            SavePhase::BuildingPayload => "building_payload",
            SavePhase::Submitting => "submitting",
            SavePhase::Done => "done",
        }
    }
}

/// Turns save requests into authenticated rowset upserts.
///
/// Every save runs `Validating -> Authenticating -> BuildingPayload ->
/// Submitting -> Done` exactly once; any stage may end the save with an
/// error, and nothing is retried here. Callers may safely repeat a whole save
/// since rows are keyed by `(emailName, fieldName)` upstream.
pub struct Relay {
    tokens: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
    credentials: CredentialsConfig,
    data_extension: DataExtensionConfig,
    max_fields: usize,
}

impl Relay {
    pub fn new(
        config: &Config,
        tokens: Arc<TokenCache>,
        clock: Arc<dyn Clock>,
        client: reqwest::Client,
    ) -> Self {
        Relay {
            tokens,
            clock,
            client,
            credentials: config.credentials.clone(),
            data_extension: config.data_extension.clone(),
            max_fields: config.limits.max_fields,
        }
    }

    /// Wires up the production collaborators: one HTTP client with the
    /// configured timeout shared by the exchange and the upsert, the system
    /// clock and a fresh token cache.
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let exchange = HttpTokenExchange::new(client.clone(), config.credentials.clone());
        let tokens = Arc::new(TokenCache::new(
            Arc::new(exchange),
            clock.clone(),
            config.credentials.safety_margin_secs,
        ));

        Ok(Relay::new(config, tokens, clock, client))
    }

    /// True once everything a save needs from the deployment is configured.
    pub fn is_ready(&self) -> bool {
        self.credentials.is_complete() && self.data_extension.external_key().is_ok()
    }

    /// Bulk upsert endpoint, or the `Config` error every request gets while
    /// credentials or the table key are missing.
    pub fn rowset_url(&self) -> Result<String, RelayError> {
        self.credentials.client_credentials()?;
        self.data_extension.rowset_url(&self.credentials)
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub async fn save(&self, request: SaveRequest) -> Result<SaveResult, RelayError> {
        let start = Instant::now();
        let mut phase = SavePhase::Validating;
        let span = tracing::info_span!(
            "save",
            email_name = %request.email_name,
            phase = tracing::field::Empty
        );

        let result = self.run(request, &mut phase).instrument(span.clone()).await;
        histogram!(SAVE_DURATION).record(start.elapsed().as_secs_f64());
        span.record("phase", phase.as_str());
        let _entered = span.enter();

        match &result {
            Ok(saved) => {
                counter!(SAVE_REQUESTS, "result" => "success", "phase" => phase.as_str())
                    .increment(1);
                tracing::info!(rows = saved.rows_submitted, "Saved fields");
            }
            Err(e) => {
                counter!(
                    SAVE_REQUESTS,
                    "result" => e.kind().as_str(),
                    "phase" => phase.as_str()
                )
                .increment(1);
                tracing::warn!(
                    kind = e.kind().as_str(),
                    error = %e,
                    "Save failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        request: SaveRequest,
        phase: &mut SavePhase,
    ) -> Result<SaveResult, RelayError> {
        let rowset_url = self.rowset_url()?;
        request.validate(self.max_fields)?;

        let entry_timestamp = format_entry_timestamp(self.clock.now());
        let rows = request.into_rows(&entry_timestamp);

        *phase = SavePhase::Authenticating;
        let token = self.tokens.get_token().await?;

        *phase = SavePhase::BuildingPayload;
        let entries = build_rowset(&rows);

        *phase = SavePhase::Submitting;
        let upstream = match RowsetClient::new(&self.client, &rowset_url)
            .upsert(&token, &entries)
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                if e.upstream_status() == Some(StatusCode::UNAUTHORIZED) {
                    // Make the next save authenticate again.
                    self.tokens.invalidate_token(&token);
                }
                return Err(e);
            }
        };
        histogram!(ROWS_SUBMITTED).record(rows.len() as f64);

        *phase = SavePhase::Done;
        Ok(SaveResult {
            rows_submitted: rows.len(),
            entry_timestamp,
            upstream,
        })
    }
}
