pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: AppConfig) -> Self {
        let notifier = Arc::new(Notifier::new(db.clone(), config.notifications_enabled));
        Self {
            db,
            config,
            metrics_handle: crate::metrics::init_metrics(),
            notifier,
        }
    }
}
