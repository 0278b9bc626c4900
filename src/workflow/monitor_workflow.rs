use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::activities::ai::PostSummarizer;
use crate::activities::{persistence, ActivityError, ProviderClient, RetryPolicy};
use crate::models::alert::AlertPriority;
use crate::models::monitor::push_post_id;

use super::signals::{MonitoringStatusSnapshot, Signal};
use super::timer;

const LEAD_PERIOD_MS: i64 = 24 * 3_600_000;
const COMPANY_PERIOD_MS: i64 = 7 * 24 * 3_600_000;
const CHUNK_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    Lead,
    Company,
}

impl MonitorKind {
    fn period_ms(self) -> i64 {
        match self {
            Self::Lead => LEAD_PERIOD_MS,
            Self::Company => COMPANY_PERIOD_MS,
        }
    }

    fn post_alert_title(self) -> &'static str {
        match self {
            Self::Lead => "New Post By Lead",
            Self::Company => "New Post By Company",
        }
    }

    /// `continueAsNew` is optional for leads, required each iteration for
    /// companies to bound history size (spec §4.6).
    fn requires_continue_as_new(self) -> bool {
        matches!(self, Self::Company)
    }
}

/// Runs one monitored entity's loop until a stop condition (there is none
/// in spec.md besides process shutdown — the workflow is open-ended) or
/// `continueAsNew` is due. Returns `true` when the caller should restart
/// the loop fresh (continueAsNew), `false` if it can keep looping in
/// place.
pub async fn run_monitor_iteration(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    summarizer: &dyn PostSummarizer,
    kind: MonitorKind,
    entity_id: Uuid,
    profile_url: &str,
    is_initial_fetch: bool,
    signals: &mut mpsc::Receiver<Signal>,
    snapshot_tx: &watch::Sender<MonitoringStatusSnapshot>,
    workflow_id: &str,
) -> Result<bool, ActivityError> {
    await_unpaused(signals, snapshot_tx, workflow_id).await?;

    if !is_initial_fetch {
        sleep_period_in_chunks(pool, workflow_id, kind.period_ms(), signals, snapshot_tx).await?;
        await_unpaused(signals, snapshot_tx, workflow_id).await?;
    }

    let fetched = RetryPolicy::default().run(|| provider.fetch_profile(profile_url)).await?;

    let existing_post_ids = match kind {
        MonitorKind::Lead => persistence::fetch_monitored_lead(pool, entity_id).await?.post_ids(),
        MonitorKind::Company => persistence::fetch_monitored_company(pool, entity_id).await?.post_ids(),
    };

    if !is_initial_fetch {
        emit_post_alerts(pool, provider, summarizer, kind, entity_id, &existing_post_ids, &fetched.posts).await?;
    } else {
        // Initial fetch only enrolls posts in the FIFO window, no alerts (spec §4.6 step 2).
        let mut window = existing_post_ids;
        for post_id in &fetched.posts {
            window = push_post_id(&window, post_id);
        }
        persist_window(pool, kind, entity_id, &window).await?;
    }

    match kind {
        MonitorKind::Lead => {
            persistence::update_monitored_lead_profile(pool, entity_id, &fetched.profile, is_initial_fetch).await?;
        }
        MonitorKind::Company => {
            persistence::update_monitored_company_profile(pool, entity_id, &fetched.profile, is_initial_fetch).await?;
        }
    }

    Ok(kind.requires_continue_as_new())
}

async fn emit_post_alerts(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    summarizer: &dyn PostSummarizer,
    kind: MonitorKind,
    entity_id: Uuid,
    existing_post_ids: &[String],
    fetched_post_ids: &[String],
) -> Result<(), ActivityError> {
    let mut window = existing_post_ids.to_vec();
    for post_id in fetched_post_ids {
        if window.contains(post_id) {
            continue;
        }
        let text = RetryPolicy::default().run(|| provider.fetch_post(post_id)).await?;
        let summary = RetryPolicy::default().run(|| summarizer.summarize_post(&text)).await?;
        let priority = if summary.is_critical { AlertPriority::High } else { AlertPriority::Low };
        let change = crate::workflow::change_detector::DetectedChange {
            title: kind.post_alert_title().to_owned(),
            description: summary.summary,
            priority,
            previous_value: None,
            updated_value: Some(post_id.clone()),
        };
        let (lead_id, company_id, reporter_user_id) = match kind {
            MonitorKind::Lead => {
                let lead = persistence::fetch_monitored_lead(pool, entity_id).await?;
                (Some(entity_id), None, lead.reporter_user_id)
            }
            MonitorKind::Company => {
                let company = persistence::fetch_monitored_company(pool, entity_id).await?;
                (None, Some(entity_id), company.reporter_user_id)
            }
        };
        persistence::add_alert(pool, lead_id, company_id, reporter_user_id, &change).await?;
        window = push_post_id(&window, post_id);
    }
    persist_window(pool, kind, entity_id, &window).await
}

async fn persist_window(pool: &PgPool, kind: MonitorKind, entity_id: Uuid, window: &[String]) -> Result<(), ActivityError> {
    match kind {
        MonitorKind::Lead => persistence::update_lead_post_window(pool, entity_id, window).await,
        MonitorKind::Company => persistence::update_company_post_window(pool, entity_id, window).await,
    }
}

/// Sleeps the monitoring period in ≤1h chunks so a pause signal can
/// interrupt between chunks (spec §4.6 step 3).
async fn sleep_period_in_chunks(
    pool: &PgPool,
    workflow_id: &str,
    total_ms: i64,
    signals: &mut mpsc::Receiver<Signal>,
    snapshot_tx: &watch::Sender<MonitoringStatusSnapshot>,
) -> Result<(), ActivityError> {
    let mut remaining = total_ms;
    while remaining > 0 {
        let chunk = remaining.min(CHUNK_MS);
        tokio::select! {
            () = async { timer::durable_sleep(pool, workflow_id, "monitor-chunk", chunk).await.ok(); } => {}
            signal = signals.recv() => {
                match signal {
                    Some(Signal::PauseMonitoring) => {
                        await_unpaused(signals, snapshot_tx, workflow_id).await?;
                    }
                    Some(_) | None => {}
                }
            }
        }
        remaining -= chunk;
    }
    Ok(())
}

async fn await_unpaused(
    signals: &mut mpsc::Receiver<Signal>,
    snapshot_tx: &watch::Sender<MonitoringStatusSnapshot>,
    workflow_id: &str,
) -> Result<(), ActivityError> {
    loop {
        match signals.try_recv() {
            Ok(Signal::PauseMonitoring) => {
                let _ = snapshot_tx.send(MonitoringStatusSnapshot { id: workflow_id.to_owned(), is_paused: true, is_running: true });
                match signals.recv().await {
                    Some(Signal::ResumeMonitoring) | None => {}
                    Some(_) => {}
                }
            }
            Ok(_) | Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => break,
        }
    }
    let _ = snapshot_tx.send(MonitoringStatusSnapshot { id: workflow_id.to_owned(), is_paused: false, is_running: true });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_monitor_requires_continue_as_new() {
        assert!(MonitorKind::Company.requires_continue_as_new());
        assert!(!MonitorKind::Lead.requires_continue_as_new());
    }

    #[test]
    fn periods_match_spec() {
        assert_eq!(MonitorKind::Lead.period_ms(), 24 * 3_600_000);
        assert_eq!(MonitorKind::Company.period_ms(), 7 * 24 * 3_600_000);
    }
}
