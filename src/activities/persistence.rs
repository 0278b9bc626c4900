use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Alert, Campaign, CampaignStatus, CampaignStep, Lead, LeadStatus, MonitoredCompany, MonitoredLead};
use crate::workflow::change_detector::{self, DetectedChange};

use super::error::ActivityError;

fn db_err(e: sqlx::Error) -> ActivityError {
    ActivityError::Transient(e.to_string())
}

/// Idempotent write: setting a lead to a status it already holds produces
/// identical observable state.
pub async fn update_lead_status(
    pool: &PgPool,
    lead_id: Uuid,
    status: LeadStatus,
) -> Result<(), ActivityError> {
    sqlx::query("UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(lead_id)
        .bind(status.as_str())
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn fetch_lead(pool: &PgPool, lead_id: Uuid) -> Result<Lead, ActivityError> {
    sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
        .bind(lead_id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| ActivityError::NotFound { entity: "lead".into() })
}

/// Appends one `CampaignStep` record. Never updates an existing row —
/// CampaignSteps are append-only per spec §3.
pub async fn record_campaign_step(
    pool: &PgPool,
    campaign_id: Uuid,
    lead_id: Uuid,
    step_index: i32,
    node_id: &str,
    action_type: Option<&str>,
    input_config: &serde_json::Value,
    success: bool,
    result: Option<&serde_json::Value>,
) -> Result<CampaignStep, ActivityError> {
    sqlx::query_as::<_, CampaignStep>(
        r"
        INSERT INTO campaign_steps
            (id, campaign_id, lead_id, step_index, node_id, action_type, input_config, success, result, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(campaign_id)
    .bind(lead_id)
    .bind(step_index)
    .bind(node_id)
    .bind(action_type)
    .bind(input_config)
    .bind(success)
    .bind(result)
    .fetch_one(pool)
    .await
    .map_err(db_err)
}

pub async fn add_alert(
    pool: &PgPool,
    lead_id: Option<Uuid>,
    company_id: Option<Uuid>,
    reporter_user_id: Uuid,
    change: &DetectedChange,
) -> Result<Alert, ActivityError> {
    sqlx::query_as::<_, Alert>(
        r"
        INSERT INTO alerts
            (id, lead_id, company_id, reporter_user_id, title, description, priority,
             acknowledged, previous_value, updated_value, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, NOW())
        RETURNING *
        ",
    )
    .bind(Uuid::new_v4())
    .bind(lead_id)
    .bind(company_id)
    .bind(reporter_user_id)
    .bind(&change.title)
    .bind(&change.description)
    .bind(change.priority.as_str())
    .bind(&change.previous_value)
    .bind(&change.updated_value)
    .fetch_one(pool)
    .await
    .map_err(db_err)
}

/// Reads the current campaign status for the lead workflow's
/// `checkCampaignStatus` helper (spec §4.5). Returns `None` when the
/// campaign row is gone, which the caller treats the same as a deleted
/// campaign — lead workflows exit and mark the lead Failed.
pub async fn fetch_campaign_status(
    pool: &PgPool,
    campaign_id: Uuid,
) -> Result<Option<CampaignStatus>, ActivityError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;
    Ok(row.map(|(status,)| CampaignStatus::from_str(&status)))
}

pub async fn fetch_campaign(pool: &PgPool, campaign_id: Uuid) -> Result<Campaign, ActivityError> {
    sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?
        .ok_or(ActivityError::NotFound { entity: "campaign".into() })
}

pub async fn fetch_monitored_lead(
    pool: &PgPool,
    id: Uuid,
) -> Result<MonitoredLead, ActivityError> {
    sqlx::query_as::<_, MonitoredLead>("SELECT * FROM monitored_leads WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?
        .ok_or(ActivityError::NotFound { entity: "monitored_lead".into() })
}

pub async fn fetch_monitored_company(
    pool: &PgPool,
    id: Uuid,
) -> Result<MonitoredCompany, ActivityError> {
    sqlx::query_as::<_, MonitoredCompany>("SELECT * FROM monitored_companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?
        .ok_or(ActivityError::NotFound { entity: "monitored_company".into() })
}

/// Diffs `new_profile` against the stored snapshot, writes alerts for every
/// detected change, and updates the snapshot columns — in the same logical
/// transaction so a second call with identical input sees an empty diff
/// (spec §4.7, §8 invariant 8).
pub async fn update_monitored_lead_profile(
    pool: &PgPool,
    id: Uuid,
    new_profile: &serde_json::Value,
    is_initial_fetch: bool,
) -> Result<Vec<Alert>, ActivityError> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let current = sqlx::query_as::<_, MonitoredLead>("SELECT * FROM monitored_leads WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or(ActivityError::NotFound { entity: "monitored_lead".into() })?;

    let changes = if is_initial_fetch {
        Vec::new()
    } else {
        change_detector::diff_lead(&current, new_profile)
    };

    sqlx::query(
        r"
        UPDATE monitored_leads SET
            full_name = $2, profile_image_url = $3, headline = $4, location = $5,
            last_job_title = $6, last_company_name = $7, last_company_id = $8,
            last_company_domain = $9, last_company_size = $10, last_company_industry = $11,
            last_experience = $12, last_education = $13, last_fetched_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(new_profile.get("full_name").and_then(|v| v.as_str()))
    .bind(new_profile.get("profile_image_url").and_then(|v| v.as_str()))
    .bind(new_profile.get("headline").and_then(|v| v.as_str()))
    .bind(new_profile.get("location").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_job_title").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_company_name").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_company_id").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_company_domain").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_company_size").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_company_industry").and_then(|v| v.as_str()))
    .bind(new_profile.get("last_experience"))
    .bind(new_profile.get("last_education"))
    .execute(&mut *tx)
    .await
    .map_err(db_err)?;

    let mut alerts = Vec::with_capacity(changes.len());
    for change in &changes {
        let alert = sqlx::query_as::<_, Alert>(
            r"
            INSERT INTO alerts
                (id, lead_id, company_id, reporter_user_id, title, description, priority,
                 acknowledged, previous_value, updated_value, created_at)
            VALUES ($1, $2, NULL, $3, $4, $5, $6, FALSE, $7, $8, NOW())
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(current.reporter_user_id)
        .bind(&change.title)
        .bind(&change.description)
        .bind(change.priority.as_str())
        .bind(&change.previous_value)
        .bind(&change.updated_value)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        alerts.push(alert);
    }

    tx.commit().await.map_err(db_err)?;
    Ok(alerts)
}

/// Same contract as [`update_monitored_lead_profile`] for companies,
/// including the numeric-counter rotation (`*_previous`,
/// `*_last_checked_at`) described in spec §4.7.
pub async fn update_monitored_company_profile(
    pool: &PgPool,
    id: Uuid,
    new_profile: &serde_json::Value,
    is_initial_fetch: bool,
) -> Result<Vec<Alert>, ActivityError> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let current = sqlx::query_as::<_, MonitoredCompany>(
        "SELECT * FROM monitored_companies WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_err)?
    .ok_or(ActivityError::NotFound { entity: "monitored_company".into() })?;

    let changes = if is_initial_fetch {
        Vec::new()
    } else {
        change_detector::diff_company(&current, new_profile)
    };

    let new_employee_count = new_profile.get("employee_count_current").and_then(serde_json::Value::as_i64);
    let new_followers_count = new_profile.get("followers_count_current").and_then(serde_json::Value::as_i64);
    let employee_changed = new_employee_count.is_some() && new_employee_count != current.employee_count_current;
    let followers_changed = new_followers_count.is_some() && new_followers_count != current.followers_count_current;

    sqlx::query(
        r"
        UPDATE monitored_companies SET
            name = $2, tagline = $3, description = $4, website = $5, employee_range = $6,
            industry = $7, hq_location = $8, logo_url = $9,
            employee_count_current = COALESCE($10, employee_count_current),
            employee_count_previous = CASE WHEN $11 THEN employee_count_current ELSE employee_count_previous END,
            employee_count_last_checked_at = CASE WHEN $11 THEN NOW() ELSE employee_count_last_checked_at END,
            followers_count_current = COALESCE($12, followers_count_current),
            followers_count_previous = CASE WHEN $13 THEN followers_count_current ELSE followers_count_previous END,
            followers_count_last_checked_at = CASE WHEN $13 THEN NOW() ELSE followers_count_last_checked_at END,
            last_fetched_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(new_profile.get("name").and_then(|v| v.as_str()))
    .bind(new_profile.get("tagline").and_then(|v| v.as_str()))
    .bind(new_profile.get("description").and_then(|v| v.as_str()))
    .bind(new_profile.get("website").and_then(|v| v.as_str()))
    .bind(new_profile.get("employee_range").and_then(|v| v.as_str()))
    .bind(new_profile.get("industry").and_then(|v| v.as_str()))
    .bind(new_profile.get("hq_location").and_then(|v| v.as_str()))
    .bind(new_profile.get("logo_url").and_then(|v| v.as_str()))
    .bind(new_employee_count)
    .bind(employee_changed)
    .bind(new_followers_count)
    .bind(followers_changed)
    .execute(&mut *tx)
    .await
    .map_err(db_err)?;

    let mut alerts = Vec::with_capacity(changes.len());
    for change in &changes {
        let alert = sqlx::query_as::<_, Alert>(
            r"
            INSERT INTO alerts
                (id, lead_id, company_id, reporter_user_id, title, description, priority,
                 acknowledged, previous_value, updated_value, created_at)
            VALUES ($1, NULL, $2, $3, $4, $5, $6, FALSE, $7, $8, NOW())
            RETURNING *
            ",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(current.reporter_user_id)
        .bind(&change.title)
        .bind(&change.description)
        .bind(change.priority.as_str())
        .bind(&change.previous_value)
        .bind(&change.updated_value)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        alerts.push(alert);
    }

    tx.commit().await.map_err(db_err)?;
    Ok(alerts)
}

/// Persists the FIFO post-id window after a new post alert is emitted.
pub async fn update_lead_post_window(
    pool: &PgPool,
    id: Uuid,
    post_ids: &[String],
) -> Result<(), ActivityError> {
    sqlx::query("UPDATE monitored_leads SET last_7_posts_ids = $2 WHERE id = $1")
        .bind(id)
        .bind(serde_json::to_value(post_ids).unwrap_or_default())
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn update_company_post_window(
    pool: &PgPool,
    id: Uuid,
    post_ids: &[String],
) -> Result<(), ActivityError> {
    sqlx::query("UPDATE monitored_companies SET last_7_posts_ids = $2 WHERE id = $1")
        .bind(id)
        .bind(serde_json::to_value(post_ids).unwrap_or_default())
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(())
}
