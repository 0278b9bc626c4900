use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Snapshot of a monitored lead's observable LinkedIn profile fields, kept
/// up to date by the lead-monitor workflow (see `workflow::monitor_workflow`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoredLead {
    pub id: Uuid,
    pub reporter_user_id: Uuid,
    pub profile_url: String,
    pub full_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub last_job_title: Option<String>,
    pub last_company_name: Option<String>,
    pub last_company_id: Option<String>,
    pub last_company_domain: Option<String>,
    pub last_company_size: Option<String>,
    pub last_company_industry: Option<String>,
    pub last_experience: Option<serde_json::Value>,
    pub last_education: Option<serde_json::Value>,
    pub last_profile_hash: Option<String>,
    pub last_7_posts_ids: serde_json::Value,
    pub is_paused: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MonitoredLead {
    #[must_use]
    pub fn workflow_id(&self) -> String {
        Self::workflow_id_for(self.id)
    }

    #[must_use]
    pub fn workflow_id_for(id: Uuid) -> String {
        format!("lead-monitor-{id}")
    }

    /// Parses the FIFO post-id window, capping defensively at 7 in case the
    /// stored value somehow grew past it (e.g. a manual DB edit).
    #[must_use]
    pub fn post_ids(&self) -> Vec<String> {
        parse_post_ids(&self.last_7_posts_ids)
    }
}

/// Snapshot of a monitored company's observable profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoredCompany {
    pub id: Uuid,
    pub reporter_user_id: Uuid,
    pub profile_url: String,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub employee_range: Option<String>,
    pub employee_count_current: Option<i64>,
    pub employee_count_previous: Option<i64>,
    pub employee_count_last_checked_at: Option<DateTime<Utc>>,
    pub followers_count_current: Option<i64>,
    pub followers_count_previous: Option<i64>,
    pub followers_count_last_checked_at: Option<DateTime<Utc>>,
    pub industry: Option<String>,
    pub hq_location: Option<String>,
    pub logo_url: Option<String>,
    pub last_profile_hash: Option<String>,
    pub last_7_posts_ids: serde_json::Value,
    pub is_paused: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MonitoredCompany {
    #[must_use]
    pub fn workflow_id(&self) -> String {
        Self::workflow_id_for(self.id)
    }

    #[must_use]
    pub fn workflow_id_for(id: Uuid) -> String {
        format!("company-monitor-{id}")
    }

    #[must_use]
    pub fn post_ids(&self) -> Vec<String> {
        parse_post_ids(&self.last_7_posts_ids)
    }
}

fn parse_post_ids(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

/// Pushes `new_id` to the front of the FIFO post-id window, truncating to
/// at most 7 entries, and deduplicating (a post id never appears twice).
#[must_use]
pub fn push_post_id(existing: &[String], new_id: &str) -> Vec<String> {
    let mut next: Vec<String> = Vec::with_capacity(existing.len() + 1);
    next.push(new_id.to_owned());
    for id in existing {
        if id != new_id {
            next.push(id.clone());
        }
    }
    next.truncate(7);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_post_id_prepends_and_caps_at_seven() {
        let existing: Vec<String> = (0..7).map(|i| format!("p{i}")).collect();
        let next = push_post_id(&existing, "new");
        assert_eq!(next.len(), 7);
        assert_eq!(next[0], "new");
        assert_eq!(next[1], "p0");
        assert!(!next.contains(&"p6".to_string()));
    }

    #[test]
    fn push_post_id_deduplicates() {
        let existing = vec!["p1".to_string(), "p2".to_string()];
        let next = push_post_id(&existing, "p2");
        assert_eq!(next, vec!["p2".to_string(), "p1".to_string()]);
    }

    #[test]
    fn parse_post_ids_handles_missing_array() {
        assert!(parse_post_ids(&serde_json::Value::Null).is_empty());
    }
}
