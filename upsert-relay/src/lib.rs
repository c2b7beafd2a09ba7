pub mod api;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod model;
pub mod payload;
pub mod relay;
pub mod rowset;
pub mod service;

use errors::RelayError;
use relay::Relay;
use service::SaveService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves saves and admin probes until either listener fails.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    let relay = Arc::new(Relay::from_config(&config)?);

    if !relay.is_ready() {
        tracing::warn!(
            "Credentials or data extension key missing; saves will fail until configured"
        );
    }

    let save_service = SaveService::new(relay.clone(), &config);
    let admin_service = AdminService::<_, RelayError>::new(move || relay.is_ready());

    let save_task = run_http_service(&config.listener.host, config.listener.port, save_service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(save_task, admin_task)?;
    Ok(())
}
