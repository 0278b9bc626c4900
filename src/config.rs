use std::env;

/// Process configuration, loaded once at bootstrap (spec §9 design notes).
/// Follows the teacher's `Config::from_env()` pattern, extended with the
/// fields this engine needs (SPEC_FULL §2.3).
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub provider_api_base_url: String,
    pub max_concurrent_leads_default: i32,
    pub lead_processing_delay_secs_default: i32,
    pub connection_poll_cadence_floor_secs: i64,
    pub daily_connection_cap_default: usize,
    pub weekly_connection_cap_default: usize,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "default-secret-change-in-production".to_string()),
            provider_api_base_url: env::var("PROVIDER_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9090".to_string()),
            max_concurrent_leads_default: env::var("MAX_CONCURRENT_LEADS_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            lead_processing_delay_secs_default: env::var("LEAD_PROCESSING_DELAY_SECS_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            connection_poll_cadence_floor_secs: env::var("CONNECTION_POLL_CADENCE_FLOOR_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            daily_connection_cap_default: env::var("DAILY_CONNECTION_CAP_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            weekly_connection_cap_default: env::var("WEEKLY_CONNECTION_CAP_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }
}
