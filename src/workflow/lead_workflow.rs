use std::collections::VecDeque;

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::activities::provider::extract_profile_identifier;
use crate::activities::{persistence, time_limits, ActivityError, ActivityResult, ProviderClient, RetryPolicy};
use crate::models::{CampaignStatus, LeadStatus};

use super::connection_polling::{self, ConnectionPollingOutcome};
use super::graph::{ActionType, Edge, RestrictedGraph, WorkflowDefinition};
use super::timer;

/// Input to one lead workflow run (spec §4.2).
#[derive(Debug, Clone)]
pub struct LeadWorkflowInput {
    pub lead_id: Uuid,
    pub campaign_id: Uuid,
    pub account_id: Uuid,
    pub profile_url: String,
    pub workflow: WorkflowDefinition,
    pub start_time: String,
    pub end_time: String,
    pub timezone: String,
    pub daily_connection_cap: usize,
    pub weekly_connection_cap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadWorkflowOutcome {
    Completed,
    Failed,
}

/// Walks the restricted DAG for one lead, persisting a `CampaignStep` per
/// executed node, honouring conditional edges and edge delays (spec §4.2).
pub async fn run_lead_workflow(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    input: &LeadWorkflowInput,
    pause_rx: &mut watch::Receiver<bool>,
) -> Result<LeadWorkflowOutcome, ActivityError> {
    let workflow_id = format!("lead-{}-{}", input.campaign_id, input.lead_id);
    persistence::update_lead_status(pool, input.lead_id, LeadStatus::Processing).await?;

    let verified = RetryPolicy::default().run(|| provider.verify_account(input.account_id)).await?;
    let Some(_provider_account_id) = verified else {
        persistence::update_lead_status(pool, input.lead_id, LeadStatus::Failed).await?;
        return Ok(LeadWorkflowOutcome::Failed);
    };

    let graph = RestrictedGraph::build(&input.workflow);
    let mut queue: VecDeque<String> = graph.seed_queue();
    let mut in_degree = graph.in_degree.clone();
    let mut step_index: i32 = 0;

    while let Some(node_id) = queue.pop_front() {
        if should_abandon_for_campaign_control(pool, input.campaign_id).await? {
            persistence::update_lead_status(pool, input.lead_id, LeadStatus::Failed).await?;
            return Ok(LeadWorkflowOutcome::Failed);
        }

        let Some(node) = graph.node(&node_id) else {
            continue;
        };

        gate_on_time_window(pool, &workflow_id, &input.start_time, &input.end_time, &input.timezone).await?;

        let outcome = match &node.action_type {
            None => ActivityResult::ok_empty(),
            Some(raw_action) => {
                let Ok(action) = ActionType::parse(raw_action) else {
                    let result = ActivityResult::fail(format!("unknown action type: {raw_action}"));
                    persistence::record_campaign_step(
                        pool,
                        input.campaign_id,
                        input.lead_id,
                        step_index,
                        &node_id,
                        Some(raw_action.as_str()),
                        &node.config,
                        false,
                        Some(&result.data),
                    )
                    .await?;
                    step_index += 1;
                    persistence::update_lead_status(pool, input.lead_id, LeadStatus::Failed).await?;
                    return Ok(LeadWorkflowOutcome::Failed);
                };
                execute_action(pool, provider, &workflow_id, input, action, &node.config, &graph, &node_id, pause_rx).await?
            }
        };

        if node.action_type.is_some() {
            persistence::record_campaign_step(
                pool,
                input.campaign_id,
                input.lead_id,
                step_index,
                &node_id,
                node.action_type.as_deref(),
                &node.config,
                outcome.success,
                Some(&outcome.data),
            )
            .await?;
            step_index += 1;
        }

        advance_edges(pool, &workflow_id, &graph, &node_id, outcome.success, &mut in_degree, &mut queue).await?;
    }

    persistence::update_lead_status(pool, input.lead_id, LeadStatus::Completed).await?;
    Ok(LeadWorkflowOutcome::Completed)
}

async fn execute_action(
    pool: &PgPool,
    provider: &dyn ProviderClient,
    workflow_id: &str,
    input: &LeadWorkflowInput,
    action: ActionType,
    config: &Value,
    graph: &RestrictedGraph,
    node_id: &str,
    pause_rx: &mut watch::Receiver<bool>,
) -> Result<ActivityResult, ActivityError> {
    let identifier = extract_profile_identifier(&input.profile_url).ok_or_else(|| {
        ActivityError::Validation(format!(
            "could not extract a provider identifier from profile url: {}",
            input.profile_url
        ))
    })?;

    match action {
        ActionType::ProfileVisit => RetryPolicy::default().run(|| provider.profile_visit(input.account_id, &identifier)).await,
        ActionType::LikePost => RetryPolicy::default().run(|| provider.like_post(input.account_id, &identifier, config)).await,
        ActionType::CommentPost => RetryPolicy::default().run(|| provider.comment_post(input.account_id, &identifier, config)).await,
        ActionType::SendFollowup => RetryPolicy::default().run(|| provider.send_followup(input.account_id, &identifier, config)).await,
        ActionType::WithdrawRequest => RetryPolicy::default().run(|| provider.withdraw_request(input.account_id, &identifier, config)).await,
        ActionType::SendInmail => RetryPolicy::default().run(|| provider.send_inmail(input.account_id, &identifier, config)).await,
        ActionType::SendConnectionRequest => {
            let rejected_edge_delay_ms = rejected_branch_delay_ms(graph, node_id);
            let outcome = connection_polling::run_connection_request(
                pool,
                provider,
                workflow_id,
                input.account_id,
                &identifier,
                config,
                rejected_edge_delay_ms,
                input.daily_connection_cap,
                input.weekly_connection_cap,
                pause_rx,
            )
            .await?;
            Ok(connection_outcome_to_activity_result(&outcome))
        }
    }
}

fn connection_outcome_to_activity_result(outcome: &ConnectionPollingOutcome) -> ActivityResult {
    ActivityResult {
        success: outcome.success,
        message: Some(outcome.status.clone()),
        data: serde_json::json!({ "status": outcome.status, "elapsedMs": outcome.elapsed_ms }),
    }
}

async fn gate_on_time_window(
    pool: &PgPool,
    workflow_id: &str,
    start: &str,
    end: &str,
    timezone: &str,
) -> Result<(), ActivityError> {
    let first = time_limits::check_time_window_activity(start, end, timezone).await?;
    if first.in_window {
        return Ok(());
    }
    timer::durable_sleep(pool, workflow_id, "time-window-gate", first.wait_ms).await?;
    // Re-check once, guarding against an off-by-one at the boundary (spec §4.4).
    let second = time_limits::check_time_window_activity(start, end, timezone).await?;
    if !second.in_window {
        timer::durable_sleep(pool, workflow_id, "time-window-gate-retry", second.wait_ms).await?;
    }
    Ok(())
}

/// Campaign-status polling helper for per-lead workflows (spec §4.5): exits
/// the lead (Failed) when the campaign is deleted or has reached a
/// terminal, non-paused status; waits in 5-minute increments while paused.
async fn should_abandon_for_campaign_control(pool: &PgPool, campaign_id: Uuid) -> Result<bool, ActivityError> {
    loop {
        let Some(status) = persistence::fetch_campaign_status(pool, campaign_id).await? else {
            return Ok(true);
        };
        match status {
            CampaignStatus::Paused => {
                tokio::time::sleep(std::time::Duration::from_secs(5 * 60)).await;
                continue;
            }
            CampaignStatus::Completed | CampaignStatus::Failed | CampaignStatus::Stopped => return Ok(true),
            CampaignStatus::Draft | CampaignStatus::Active => return Ok(false),
        }
    }
}

/// For every outgoing edge from `node_id`: conditional edges follow only
/// when `isPositive == success`; in-degree is decremented regardless so
/// un-taken branches don't strand the target (spec §4.2 step 5).
async fn advance_edges(
    pool: &PgPool,
    workflow_id: &str,
    graph: &RestrictedGraph,
    node_id: &str,
    success: bool,
    in_degree: &mut std::collections::HashMap<String, u32>,
    queue: &mut VecDeque<String>,
) -> Result<(), ActivityError> {
    for edge in graph.outgoing_edges(node_id) {
        let should_follow = !edge.data.is_conditional_path || edge.data.is_positive == success;

        if should_follow {
            let delay_ms = edge.delay_ms();
            if delay_ms > 0 {
                timer::durable_sleep(pool, workflow_id, &format!("edge-delay-{}", edge.id), delay_ms).await?;
            }
        }

        if let Some(degree) = in_degree.get_mut(&edge.target) {
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                queue.push_back(edge.target.clone());
            }
        }
    }
    Ok(())
}

/// Looks up the rejected-branch (`isPositive=false`) outgoing edge from a
/// `send_connection_request` node, used to derive the polling horizon
/// (spec §4.3 step 5).
#[must_use]
pub fn rejected_branch_delay_ms(graph: &RestrictedGraph, node_id: &str) -> Option<i64> {
    graph
        .outgoing_edges(node_id)
        .iter()
        .find(|e| e.data.is_conditional_path && !e.data.is_positive)
        .map(Edge::delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::{EdgeData, Node, NodeClass};

    fn node(id: &str, action: Option<&str>) -> Node {
        Node { id: id.into(), class: NodeClass::Action, action_type: action.map(str::to_owned), config: serde_json::json!({ "identifier": "jane" }) }
    }

    fn edge(id: &str, source: &str, target: &str, conditional: bool, positive: bool) -> Edge {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            data: EdgeData { is_conditional_path: conditional, is_positive: positive, delay_data: None },
        }
    }

    #[test]
    fn rejected_branch_delay_found_on_conditional_negative_edge() {
        let def = WorkflowDefinition {
            nodes: vec![node("a", Some("send_connection_request")), node("b", Some("send_followup")), node("c", Some("withdraw_request"))],
            edges: vec![
                edge("e1", "a", "b", true, true),
                Edge {
                    id: "e2".into(),
                    source: "a".into(),
                    target: "c".into(),
                    data: EdgeData {
                        is_conditional_path: true,
                        is_positive: false,
                        delay_data: Some(super::super::graph::EdgeDelay { delay: 24, unit: super::super::graph::DelayUnit::H }),
                    },
                },
            ],
        };
        let graph = RestrictedGraph::build(&def);
        assert_eq!(rejected_branch_delay_ms(&graph, "a"), Some(24 * 3_600_000));
    }

    #[test]
    fn no_rejected_branch_returns_none() {
        let def = WorkflowDefinition {
            nodes: vec![node("a", Some("profile_visit")), node("b", Some("like_post"))],
            edges: vec![edge("e1", "a", "b", false, false)],
        };
        let graph = RestrictedGraph::build(&def);
        assert_eq!(rejected_branch_delay_ms(&graph, "a"), None);
    }
}
