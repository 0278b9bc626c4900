use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::activities::ai::HttpPostSummarizer;
use crate::models::{MonitoredCompany, MonitoredLead};
use crate::workflow::monitor_workflow::{self, MonitorKind};
use crate::workflow::signals::{MonitoringStatusSnapshot, Signal};
use crate::AppState;

/// HTTP surface for the per-entity monitor loops (spec §4.6, §4.8). Start
/// endpoints create-or-reattach the monitor workflow (deterministic
/// workflow id, see `MonitoredLead::workflow_id`); pause/resume map
/// straight onto signals.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/monitors/leads/{id}/start").route(web::post().to(start_lead_monitor)))
        .service(web::resource("/monitors/leads/{id}/pause").route(web::post().to(pause_lead_monitor)))
        .service(web::resource("/monitors/leads/{id}/resume").route(web::post().to(resume_lead_monitor)))
        .service(web::resource("/monitors/leads/{id}/status").route(web::get().to(lead_monitor_status)))
        .service(web::resource("/monitors/companies/{id}/start").route(web::post().to(start_company_monitor)))
        .service(web::resource("/monitors/companies/{id}/pause").route(web::post().to(pause_company_monitor)))
        .service(web::resource("/monitors/companies/{id}/resume").route(web::post().to(resume_company_monitor)))
        .service(web::resource("/monitors/companies/{id}/status").route(web::get().to(company_monitor_status)));
}

#[derive(Debug, Deserialize)]
struct StartMonitorRequest {
    reporter_user_id: Uuid,
    profile_url: String,
}

async fn start_lead_monitor(state: web::Data<AppState>, body: web::Json<StartMonitorRequest>) -> actix_web::Result<HttpResponse> {
    let lead = find_or_create_monitored_lead(&state, body.reporter_user_id, &body.profile_url).await?;
    let workflow_id = lead.workflow_id();
    if !state.lead_monitor_runtime.is_running(&workflow_id) {
        spawn_monitor(&state, MonitorKind::Lead, lead.id, lead.profile_url.clone(), &workflow_id).await?;
    }
    Ok(HttpResponse::Ok().json(&workflow_id))
}

async fn start_company_monitor(state: web::Data<AppState>, body: web::Json<StartMonitorRequest>) -> actix_web::Result<HttpResponse> {
    let company = find_or_create_monitored_company(&state, body.reporter_user_id, &body.profile_url).await?;
    let workflow_id = company.workflow_id();
    if !state.company_monitor_runtime.is_running(&workflow_id) {
        spawn_monitor(&state, MonitorKind::Company, company.id, company.profile_url.clone(), &workflow_id).await?;
    }
    Ok(HttpResponse::Ok().json(&workflow_id))
}

async fn pause_lead_monitor(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredLead::workflow_id_for(path.into_inner());
    state.lead_monitor_runtime.signal(&workflow_id, Signal::PauseMonitoring).await;
    Ok(HttpResponse::Ok().finish())
}

async fn resume_lead_monitor(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredLead::workflow_id_for(path.into_inner());
    state.lead_monitor_runtime.signal(&workflow_id, Signal::ResumeMonitoring).await;
    Ok(HttpResponse::Ok().finish())
}

async fn pause_company_monitor(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredCompany::workflow_id_for(path.into_inner());
    state.company_monitor_runtime.signal(&workflow_id, Signal::PauseMonitoring).await;
    Ok(HttpResponse::Ok().finish())
}

async fn resume_company_monitor(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredCompany::workflow_id_for(path.into_inner());
    state.company_monitor_runtime.signal(&workflow_id, Signal::ResumeMonitoring).await;
    Ok(HttpResponse::Ok().finish())
}

async fn lead_monitor_status(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredLead::workflow_id_for(path.into_inner());
    let snapshot = state
        .lead_monitor_runtime
        .query(&workflow_id)
        .unwrap_or_else(|| MonitoringStatusSnapshot::not_running(workflow_id.clone()));
    Ok(HttpResponse::Ok().json(snapshot))
}

async fn company_monitor_status(state: web::Data<AppState>, path: web::Path<Uuid>) -> actix_web::Result<HttpResponse> {
    let workflow_id = MonitoredCompany::workflow_id_for(path.into_inner());
    let snapshot = state
        .company_monitor_runtime
        .query(&workflow_id)
        .unwrap_or_else(|| MonitoringStatusSnapshot::not_running(workflow_id.clone()));
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Boot-time recovery sweep, mirroring `campaigns::reconcile`: restarts
/// every unpaused monitor loop left without a registered workflow.
pub async fn reconcile(state: &AppState) {
    match sqlx::query_as::<_, MonitoredLead>("SELECT * FROM monitored_leads WHERE is_paused = FALSE").fetch_all(&state.pool).await {
        Ok(leads) => {
            for lead in leads {
                let workflow_id = lead.workflow_id();
                if !state.lead_monitor_runtime.is_running(&workflow_id) {
                    if let Err(e) = spawn_monitor(state, MonitorKind::Lead, lead.id, lead.profile_url.clone(), &workflow_id).await {
                        tracing::warn!("reconcile: could not restart lead monitor {}: {e}", lead.id);
                    }
                }
            }
        }
        Err(e) => tracing::error!("reconcile: failed to list monitored leads: {e}"),
    }

    match sqlx::query_as::<_, MonitoredCompany>("SELECT * FROM monitored_companies WHERE is_paused = FALSE").fetch_all(&state.pool).await {
        Ok(companies) => {
            for company in companies {
                let workflow_id = company.workflow_id();
                if !state.company_monitor_runtime.is_running(&workflow_id) {
                    if let Err(e) = spawn_monitor(state, MonitorKind::Company, company.id, company.profile_url.clone(), &workflow_id).await {
                        tracing::warn!("reconcile: could not restart company monitor {}: {e}", company.id);
                    }
                }
            }
        }
        Err(e) => tracing::error!("reconcile: failed to list monitored companies: {e}"),
    }
}

async fn find_or_create_monitored_lead(state: &AppState, reporter_user_id: Uuid, profile_url: &str) -> actix_web::Result<MonitoredLead> {
    if let Some(existing) = sqlx::query_as::<_, MonitoredLead>(
        "SELECT * FROM monitored_leads WHERE reporter_user_id = $1 AND profile_url = $2",
    )
    .bind(reporter_user_id)
    .bind(profile_url)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
    {
        return Ok(existing);
    }

    sqlx::query_as::<_, MonitoredLead>(
        r"
        INSERT INTO monitored_leads (id, reporter_user_id, profile_url, last_7_posts_ids, is_paused, created_at)
        VALUES ($1, $2, $3, '[]'::jsonb, FALSE, NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(reporter_user_id)
    .bind(profile_url)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))
}

async fn find_or_create_monitored_company(state: &AppState, reporter_user_id: Uuid, profile_url: &str) -> actix_web::Result<MonitoredCompany> {
    if let Some(existing) = sqlx::query_as::<_, MonitoredCompany>(
        "SELECT * FROM monitored_companies WHERE reporter_user_id = $1 AND profile_url = $2",
    )
    .bind(reporter_user_id)
    .bind(profile_url)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
    {
        return Ok(existing);
    }

    sqlx::query_as::<_, MonitoredCompany>(
        r"
        INSERT INTO monitored_companies (id, reporter_user_id, profile_url, last_7_posts_ids, is_paused, created_at)
        VALUES ($1, $2, $3, '[]'::jsonb, FALSE, NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(reporter_user_id)
    .bind(profile_url)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))
}

pub(crate) async fn spawn_monitor(
    state: &AppState,
    kind: MonitorKind,
    entity_id: Uuid,
    profile_url: String,
    workflow_id: &str,
) -> actix_web::Result<()> {
    // A previous process may have crashed mid-sleep; this workflow restarts
    // from the top rather than resuming that sleep, so any leftover row is
    // now stale.
    let _ = crate::workflow::timer::clear_timers_for_workflow(&state.pool, workflow_id).await;

    let (signal_tx, mut signal_rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot_rx) = watch::channel(MonitoringStatusSnapshot { id: workflow_id.to_owned(), is_paused: false, is_running: true });

    let pool = state.pool.clone();
    let provider = Arc::clone(&state.provider);
    let base_url = std::env::var("AI_SUMMARIZER_BASE_URL").unwrap_or_else(|_| "http://localhost:9091".to_string());
    let workflow_id_owned = workflow_id.to_owned();

    let join = tokio::spawn(async move {
        let summarizer = HttpPostSummarizer::new(base_url);
        let mut is_initial_fetch = true;
        loop {
            let result = monitor_workflow::run_monitor_iteration(
                &pool,
                provider.as_ref(),
                &summarizer,
                kind,
                entity_id,
                &profile_url,
                is_initial_fetch,
                &mut signal_rx,
                &snapshot_tx,
                &workflow_id_owned,
            )
            .await;
            is_initial_fetch = false;
            match result {
                Ok(_continue_as_new) => {}
                Err(_) => break,
            }
        }
    });

    let runtime = match kind {
        MonitorKind::Lead => &state.lead_monitor_runtime,
        MonitorKind::Company => &state.company_monitor_runtime,
    };
    runtime.register(
        workflow_id.to_owned(),
        crate::workflow::WorkflowHandle { join, signals: signal_tx, snapshot: snapshot_rx },
    );
    Ok(())
}
