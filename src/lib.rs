pub mod activities;
pub mod config;
pub mod middleware;
pub mod models;
pub mod workflow;

pub mod api;

use std::sync::Arc;

use sqlx::PgPool;

use activities::provider::LinkedInProviderClient;
use activities::ProviderClient;
use workflow::runtime::Runtime;
use workflow::signals::{CampaignStatusSnapshot, MonitoringStatusSnapshot};

/// Process-wide resources initialised once during worker/API bootstrap and
/// shared by every request handler and workflow task (spec §9 design
/// notes: global singletons are process-wide, initialised once, no
/// module-level mutable state inside workflow code).
pub struct AppState {
    pub pool: PgPool,
    pub provider: Arc<dyn ProviderClient>,
    pub campaign_runtime: Arc<Runtime<CampaignStatusSnapshot>>,
    pub lead_monitor_runtime: Arc<Runtime<MonitoringStatusSnapshot>>,
    pub company_monitor_runtime: Arc<Runtime<MonitoringStatusSnapshot>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: &config::Config) -> Self {
        Self {
            pool,
            provider: Arc::new(LinkedInProviderClient::new(config.provider_api_base_url.clone())),
            campaign_runtime: Arc::new(Runtime::new()),
            lead_monitor_runtime: Arc::new(Runtime::new()),
            company_monitor_runtime: Arc::new(Runtime::new()),
        }
    }
}
