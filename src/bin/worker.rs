use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::time::sleep;

use leadflow::api::{campaigns, monitors};
use leadflow::config::Config;
use leadflow::workflow::timer;
use leadflow::AppState;

/// Hosts the in-process workflow `Runtime`s (spec §3 Open Question 6).
/// Since workflows live only in memory, this process's job on every boot
/// is to reconcile: restart the orchestrator for every campaign left
/// `active` and every monitor loop left unpaused by a prior crash or
/// deploy, then keep sweeping periodically in case new ones were created
/// through the API while this process was down.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to create pool");

    let state = AppState::new(pool, &config);

    match timer::load_pending_timers(&state.pool).await {
        Ok(pending) if !pending.is_empty() => {
            tracing::warn!(
                "leadflow worker started with {} leftover timer row(s) from a prior crash; \
                 the reconcile sweep will restart their workflows and clear them",
                pending.len()
            );
        }
        Ok(_) => tracing::info!("leadflow worker started"),
        Err(e) => tracing::error!("leadflow worker started (failed to read timer state: {e})"),
    }

    let mut iteration = 0u64;
    loop {
        iteration += 1;

        campaigns::reconcile(&state).await;
        monitors::reconcile(&state).await;

        if iteration % 60 == 0 {
            tracing::info!("[{iteration}] reconciliation sweep complete");
        }

        sleep(Duration::from_secs(30)).await;
    }
}
