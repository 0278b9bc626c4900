use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::activities::ActivityError;

fn db_err(e: sqlx::Error) -> ActivityError {
    ActivityError::Transient(e.to_string())
}

/// One durable sleep in flight, persisted so a worker restart can resume it
/// for its remaining duration instead of replaying history (SPEC_FULL §3,
/// open question #6 — this engine's replay mechanism).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkflowTimer {
    pub id: Uuid,
    pub workflow_id: String,
    pub label: String,
    pub wake_at: DateTime<Utc>,
}

pub async fn persist_timer(
    pool: &PgPool,
    workflow_id: &str,
    label: &str,
    wake_at: DateTime<Utc>,
) -> Result<Uuid, ActivityError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO workflow_timers (id, workflow_id, label, wake_at, created_at) VALUES ($1, $2, $3, $4, NOW())",
    )
    .bind(id)
    .bind(workflow_id)
    .bind(label)
    .bind(wake_at)
    .execute(pool)
    .await
    .map_err(db_err)?;
    Ok(id)
}

pub async fn clear_timer(pool: &PgPool, id: Uuid) -> Result<(), ActivityError> {
    sqlx::query("DELETE FROM workflow_timers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Loads every still-persisted timer row, for the worker's boot-time
/// diagnostic log (a nonzero count at startup means the previous process
/// crashed mid-sleep somewhere).
pub async fn load_pending_timers(pool: &PgPool) -> Result<Vec<WorkflowTimer>, ActivityError> {
    sqlx::query_as::<_, WorkflowTimer>("SELECT * FROM workflow_timers ORDER BY wake_at ASC")
        .fetch_all(pool)
        .await
        .map_err(db_err)
}

/// Purges any timer rows left behind by a workflow that crashed mid-sleep.
/// Called before a workflow is restarted from its top-level entry point
/// (spec.md §8, SPEC_FULL open question #6): this engine does not resume a
/// sleep at the point it crashed, it re-derives the next action from
/// persisted DB state, so a stale row would otherwise linger forever.
pub async fn clear_timers_for_workflow(pool: &PgPool, workflow_id: &str) -> Result<(), ActivityError> {
    sqlx::query("DELETE FROM workflow_timers WHERE workflow_id = $1")
        .bind(workflow_id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Sleeps a durable timer: persists the row, sleeps the real-time delta
/// (floored at zero for timers whose deadline already passed), then clears
/// the row. Sleep granularity floors at whole seconds per spec §9 design
/// notes.
pub async fn durable_sleep(
    pool: &PgPool,
    workflow_id: &str,
    label: &str,
    duration_ms: i64,
) -> Result<(), ActivityError> {
    let wake_at = Utc::now() + chrono::Duration::milliseconds(duration_ms.max(0));
    let id = persist_timer(pool, workflow_id, label, wake_at).await?;
    sleep_until(wake_at).await;
    clear_timer(pool, id).await
}

async fn sleep_until(wake_at: DateTime<Utc>) {
    let remaining = (wake_at - Utc::now()).num_milliseconds().max(0);
    let floored_secs = (remaining / 1000).max(0) as u64;
    tokio::time::sleep(std::time::Duration::from_secs(floored_secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_until_past_deadline_returns_immediately() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let start = tokio::time::Instant::now();
        sleep_until(past).await;
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
    }
}
