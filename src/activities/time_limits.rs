use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::workflow::time_window::{
    check_connection_request_limits, check_time_window, RateLimitCheck, TimeWindowResult,
};

use super::error::ActivityError;

/// Activity wrapper around the pure time-window gate (spec §4.4). Kept
/// separate from the pure function so workflow code calls an activity
/// (durable, replay-safe) while unit tests exercise the math directly
/// against fixed instants.
pub async fn check_time_window_activity(
    start: &str,
    end: &str,
    timezone: &str,
) -> Result<TimeWindowResult, ActivityError> {
    Ok(check_time_window(start, end, timezone, Utc::now()))
}

/// Loads successful `send_connection_request` timestamps for `account_id`
/// from `campaign_steps` and evaluates the rolling daily/weekly caps.
pub async fn check_connection_request_limits_activity(
    pool: &PgPool,
    account_id: Uuid,
    daily_cap: usize,
    weekly_cap: usize,
) -> Result<RateLimitCheck, ActivityError> {
    let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
        r"
        SELECT cs.created_at
        FROM campaign_steps cs
        JOIN campaigns c ON cs.campaign_id = c.id
        WHERE c.sender_account_id = $1
          AND cs.action_type = 'send_connection_request'
          AND cs.success = TRUE
          AND cs.created_at > NOW() - INTERVAL '7 days'
        ",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await
    .map_err(|e| ActivityError::Transient(e.to_string()))?;

    let sent_at: Vec<DateTime<Utc>> = rows.into_iter().map(|(t,)| t).collect();
    Ok(check_connection_request_limits(&sent_at, daily_cap, weekly_cap, Utc::now()))
}
