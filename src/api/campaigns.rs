use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, Lead};
use crate::workflow::campaign_workflow::{self, CampaignOrchestratorInput};
use crate::workflow::signals::{CampaignStatusSnapshot, Signal};
use crate::workflow::WorkflowDefinition;
use crate::AppState;

/// HTTP surface mapping campaign control actions onto C5's signals/query
/// (spec §4.8, §6). Out of core scope — the workflow engine doesn't care
/// how its signals were triggered.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/campaigns").route(web::get().to(list_campaigns)))
        .service(web::resource("/campaigns/create").route(web::post().to(create_campaign)))
        .service(web::resource("/campaigns/{id}/pause").route(web::post().to(pause_campaign)))
        .service(web::resource("/campaigns/{id}/resume").route(web::post().to(resume_campaign)))
        .service(web::resource("/campaigns/{id}/stop").route(web::post().to(stop_campaign)))
        .service(web::resource("/campaigns/{id}/status").route(web::get().to(campaign_status)));
}

#[derive(Debug, Deserialize)]
struct CreateCampaignRequest {
    organization_id: Uuid,
    name: String,
    description: Option<String>,
    sender_account_id: Uuid,
    prospect_list_id: Uuid,
    window_start_time: String,
    window_end_time: String,
    window_timezone: String,
    leads_per_day: i32,
    workflow_definition_ref: String,
}

async fn list_campaigns(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let campaigns = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns ORDER BY created_at DESC")
        .fetch_all(&state.pool)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
    Ok(HttpResponse::Ok().json(campaigns))
}

async fn create_campaign(state: web::Data<AppState>, body: web::Json<CreateCampaignRequest>) -> actix_web::Result<HttpResponse> {
    let campaign = sqlx::query_as::<_, Campaign>(
        r"
        INSERT INTO campaigns
            (id, organization_id, name, description, sender_account_id, prospect_list_id,
             window_start_time, window_end_time, window_timezone, leads_per_day,
             workflow_definition_ref, status, max_concurrent_leads, lead_processing_delay_secs,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'draft', $12, $13, NOW(), NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(body.organization_id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.sender_account_id)
    .bind(body.prospect_list_id)
    .bind(&body.window_start_time)
    .bind(&body.window_end_time)
    .bind(&body.window_timezone)
    .bind(body.leads_per_day)
    .bind(&body.workflow_definition_ref)
    .bind(5i32)
    .bind(30i32)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    Ok(HttpResponse::Ok().json(campaign))
}

async fn pause_campaign(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    dispatch_signal(&state, path.into_inner(), Signal::PauseCampaign).await
}

async fn resume_campaign(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    dispatch_signal(&state, path.into_inner(), Signal::ResumeCampaign).await
}

async fn stop_campaign(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    dispatch_signal(&state, path.into_inner(), Signal::StopCampaign).await
}

async fn dispatch_signal(state: &AppState, campaign_id: Uuid, signal: Signal) -> actix_web::Result<HttpResponse> {
    let workflow_id = campaign_workflow::workflow_id_for(campaign_id);
    if state.campaign_runtime.signal(&workflow_id, signal.clone()).await {
        return Ok(HttpResponse::Ok().finish());
    }
    // Unknown-workflow signal: start-then-signal (spec §4.5).
    start_campaign_workflow(state, campaign_id).await?;
    state.campaign_runtime.signal(&workflow_id, signal).await;
    Ok(HttpResponse::Ok().finish())
}

async fn campaign_status(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = campaign_workflow::workflow_id_for(path.into_inner());
    let snapshot = state
        .campaign_runtime
        .query(&workflow_id)
        .unwrap_or_else(CampaignStatusSnapshot::not_running);
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Restarts the orchestrator for every campaign left `active` by a crash
/// or deploy. Workflows live only in this process's in-memory `Runtime`
/// (spec §3 Open Question 6), so a fresh process has none registered —
/// this is the worker's boot-time recovery sweep.
pub async fn reconcile(state: &AppState) {
    let active = match sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE status = 'active'")
        .fetch_all(&state.pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("reconcile: failed to list active campaigns: {e}");
            return;
        }
    };
    for campaign in active {
        let workflow_id = campaign_workflow::workflow_id_for(campaign.id);
        if state.campaign_runtime.is_running(&workflow_id) {
            continue;
        }
        if let Err(e) = start_campaign_workflow(state, campaign.id).await {
            tracing::warn!("reconcile: could not restart campaign {}: {e}", campaign.id);
        }
    }
}

pub(crate) async fn start_campaign_workflow(state: &AppState, campaign_id: Uuid) -> actix_web::Result<()> {
    let workflow_id = campaign_workflow::workflow_id_for(campaign_id);
    if state.campaign_runtime.is_running(&workflow_id) {
        return Ok(());
    }
    // A previous process may have crashed mid-sleep; this workflow restarts
    // from the top rather than resuming that sleep, so any leftover row is
    // now stale.
    let _ = crate::workflow::timer::clear_timers_for_workflow(&state.pool, &workflow_id).await;

    let campaign = sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("campaign not found"))?;

    if campaign.status() != CampaignStatus::Active {
        return Err(actix_web::error::ErrorBadRequest("campaign is not active"));
    }

    // Terminal leads have already walked their whole DAG; re-dispatching
    // them (e.g. on every reconcile() sweep) would re-run provider-affecting
    // activities that already completed or failed for good.
    let leads = sqlx::query_as::<_, Lead>(
        "SELECT * FROM leads WHERE campaign_id = $1 AND status NOT IN ('completed', 'failed') ORDER BY created_at ASC",
    )
    .bind(campaign_id)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let definition_json = fetch_workflow_definition_json(&campaign.workflow_definition_ref)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let workflow: WorkflowDefinition = serde_json::from_value(definition_json)
        .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot_rx) = watch::channel(CampaignStatusSnapshot { is_paused: false, is_running: true });

    let pool = state.pool.clone();
    let provider = Arc::clone(&state.provider);
    let input = CampaignOrchestratorInput {
        campaign,
        leads,
        workflow,
        daily_connection_cap: 20,
        weekly_connection_cap: 100,
    };

    let join = tokio::spawn(async move {
        let _ = campaign_workflow::run_campaign_workflow(pool, provider, signal_rx, snapshot_tx, input).await;
    });

    state.campaign_runtime.register(
        workflow_id,
        crate::workflow::WorkflowHandle { join, signals: signal_tx, snapshot: snapshot_rx },
    );
    Ok(())
}

/// Object storage is out of core scope (spec §6): workflow JSON is opaque
/// to the core and is assumed already resolvable by reference. This stub
/// models the interface the graph walker actually depends on.
async fn fetch_workflow_definition_json(_reference: &str) -> Result<serde_json::Value, String> {
    Err("object storage client is an external collaborator, not implemented in this crate".into())
}
