use serde_json::Value;

use crate::models::alert::AlertPriority;
use crate::models::{MonitoredCompany, MonitoredLead};

/// One field-level change, ready to be persisted as an `Alert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedChange {
    pub title: String,
    pub description: String,
    pub priority: AlertPriority,
    pub previous_value: Option<String>,
    pub updated_value: Option<String>,
}

/// `false` if both nullish, `false` if equal, `true` otherwise. Scalars and
/// deep structures both use this rule (spec §4.7).
#[must_use]
pub fn has_real_change(a: &Value, b: &Value) -> bool {
    if a == b {
        return false;
    }
    if a.is_null() && b.is_null() {
        return false;
    }
    true
}

fn scalar_change(
    field: &str,
    title: &str,
    priority: AlertPriority,
    previous: &Value,
    updated: &Value,
) -> Option<DetectedChange> {
    if !has_real_change(previous, updated) {
        return None;
    }
    Some(DetectedChange {
        title: title.to_owned(),
        description: format!(
            "{field} changed from {} to {}",
            display_value(previous),
            display_value(updated)
        ),
        priority,
        previous_value: value_to_string(previous),
        updated_value: value_to_string(updated),
    })
}

fn deep_change(
    field: &str,
    title: &str,
    priority: AlertPriority,
    previous: &Value,
    updated: &Value,
) -> Option<DetectedChange> {
    if !has_real_change(previous, updated) {
        return None;
    }
    Some(DetectedChange {
        title: title.to_owned(),
        description: format!("{field} changed"),
        priority,
        previous_value: value_to_string(previous),
        updated_value: value_to_string(updated),
    })
}

/// Generic fields (images, logos) get a non-specific description even
/// though the comparison is scalar.
fn opaque_change(
    field: &str,
    title: &str,
    priority: AlertPriority,
    previous: &Value,
    updated: &Value,
) -> Option<DetectedChange> {
    if !has_real_change(previous, updated) {
        return None;
    }
    Some(DetectedChange {
        title: title.to_owned(),
        description: format!("{field} changed"),
        priority,
        previous_value: value_to_string(previous),
        updated_value: value_to_string(updated),
    })
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_owned(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn opt_str_to_value(s: &Option<String>) -> Value {
    s.as_deref().map_or(Value::Null, |s| Value::String(s.to_owned()))
}

fn field(new_profile: &Value, key: &str) -> Value {
    new_profile.get(key).cloned().unwrap_or(Value::Null)
}

/// Diffs `new_profile` against `current`'s stored snapshot, field by field,
/// per the table in spec §4.7. One alert per changed field — no
/// `switch(true)` fallthrough (SPEC_FULL open question #1).
#[must_use]
pub fn diff_lead(current: &MonitoredLead, new_profile: &Value) -> Vec<DetectedChange> {
    let mut changes = Vec::new();

    if let Some(c) = scalar_change(
        "full_name",
        "Full Name Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.full_name),
        &field(new_profile, "full_name"),
    ) {
        changes.push(c);
    }
    if let Some(c) = opaque_change(
        "profile_image_url",
        "Profile Photo Changed",
        AlertPriority::Low,
        &opt_str_to_value(&current.profile_image_url),
        &field(new_profile, "profile_image_url"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "headline",
        "HeadLine Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.headline),
        &field(new_profile, "headline"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "location",
        "Location Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.location),
        &field(new_profile, "location"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_job_title",
        "Job Title Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.last_job_title),
        &field(new_profile, "last_job_title"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_company_name",
        "Company Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.last_company_name),
        &field(new_profile, "last_company_name"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_company_id",
        "Company Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.last_company_id),
        &field(new_profile, "last_company_id"),
    ) {
        changes.push(c);
    }
    if let Some(c) = deep_change(
        "last_experience",
        "Experience Changed",
        AlertPriority::High,
        current.last_experience.as_ref().unwrap_or(&Value::Null),
        &field(new_profile, "last_experience"),
    ) {
        changes.push(c);
    }
    if let Some(c) = deep_change(
        "last_education",
        "Education Changed",
        AlertPriority::Low,
        current.last_education.as_ref().unwrap_or(&Value::Null),
        &field(new_profile, "last_education"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_company_domain",
        "Company Domain Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.last_company_domain),
        &field(new_profile, "last_company_domain"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_company_size",
        "Company Size Changed",
        AlertPriority::Low,
        &opt_str_to_value(&current.last_company_size),
        &field(new_profile, "last_company_size"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "last_company_industry",
        "Company Industry Changed",
        AlertPriority::Low,
        &opt_str_to_value(&current.last_company_industry),
        &field(new_profile, "last_company_industry"),
    ) {
        changes.push(c);
    }

    changes
}

#[must_use]
pub fn diff_company(current: &MonitoredCompany, new_profile: &Value) -> Vec<DetectedChange> {
    let mut changes = Vec::new();

    if let Some(c) = scalar_change(
        "name",
        "Company Name Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.name),
        &field(new_profile, "name"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "tagline",
        "Tagline Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.tagline),
        &field(new_profile, "tagline"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "description",
        "Description Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.description),
        &field(new_profile, "description"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "website",
        "Website Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.website),
        &field(new_profile, "website"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "employee_range",
        "Employee Range Changed",
        AlertPriority::Medium,
        &opt_str_to_value(&current.employee_range),
        &field(new_profile, "employee_range"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "industry",
        "Industry Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.industry),
        &field(new_profile, "industry"),
    ) {
        changes.push(c);
    }
    if let Some(c) = scalar_change(
        "hq_location",
        "HQ Location Changed",
        AlertPriority::High,
        &opt_str_to_value(&current.hq_location),
        &field(new_profile, "hq_location"),
    ) {
        changes.push(c);
    }
    if let Some(c) = opaque_change(
        "logo_url",
        "Logo Changed",
        AlertPriority::Low,
        &opt_str_to_value(&current.logo_url),
        &field(new_profile, "logo_url"),
    ) {
        changes.push(c);
    }
    if let Some(new_count) = new_profile.get("employee_count_current").and_then(Value::as_i64) {
        if current.employee_count_current != Some(new_count) {
            changes.push(DetectedChange {
                title: "Employee Count Changed".to_owned(),
                description: format!(
                    "employee_count_current changed from {} to {new_count}",
                    current.employee_count_current.map_or("null".to_owned(), |v| v.to_string())
                ),
                priority: AlertPriority::Medium,
                previous_value: current.employee_count_current.map(|v| v.to_string()),
                updated_value: Some(new_count.to_string()),
            });
        }
    }
    if let Some(new_count) = new_profile.get("followers_count_current").and_then(Value::as_i64) {
        if current.followers_count_current != Some(new_count) {
            changes.push(DetectedChange {
                title: "Followers Changed".to_owned(),
                description: format!(
                    "followers_count_current changed from {} to {new_count}",
                    current.followers_count_current.map_or("null".to_owned(), |v| v.to_string())
                ),
                priority: AlertPriority::Low,
                previous_value: current.followers_count_current.map(|v| v.to_string()),
                updated_value: Some(new_count.to_string()),
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn base_lead() -> MonitoredLead {
        MonitoredLead {
            id: Uuid::new_v4(),
            reporter_user_id: Uuid::new_v4(),
            profile_url: "https://linkedin.com/in/jane".into(),
            full_name: Some("A".into()),
            profile_image_url: None,
            headline: None,
            location: None,
            last_job_title: None,
            last_company_name: None,
            last_company_id: None,
            last_company_domain: None,
            last_company_size: None,
            last_company_industry: None,
            last_experience: None,
            last_education: None,
            last_profile_hash: None,
            last_7_posts_ids: json!([]),
            is_paused: false,
            last_fetched_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn has_real_change_both_nullish_is_false() {
        assert!(!has_real_change(&Value::Null, &Value::Null));
    }

    #[test]
    fn has_real_change_equal_is_false() {
        assert!(!has_real_change(&json!("a"), &json!("a")));
    }

    #[test]
    fn has_real_change_differing_is_true() {
        assert!(has_real_change(&json!("a"), &json!("b")));
        assert!(has_real_change(&Value::Null, &json!("a")));
    }

    #[test]
    fn s5_headline_change_emits_single_medium_alert() {
        let lead = base_lead();
        let new_profile = json!({ "full_name": "A", "headline": "VP" });
        let changes = diff_lead(&lead, &new_profile);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].title, "HeadLine Changed");
        assert_eq!(changes[0].priority, AlertPriority::Medium);
        assert!(changes[0].description.contains("null"));
        assert!(changes[0].description.contains("VP"));
    }

    #[test]
    fn no_change_means_empty_diff() {
        let lead = base_lead();
        let new_profile = json!({ "full_name": "A" });
        assert!(diff_lead(&lead, &new_profile).is_empty());
    }

    #[test]
    fn location_change_is_high_priority() {
        let lead = base_lead();
        let new_profile = json!({ "full_name": "A", "location": "Berlin" });
        let changes = diff_lead(&lead, &new_profile);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].priority, AlertPriority::High);
    }

    #[test]
    fn deep_experience_change_detected() {
        let mut lead = base_lead();
        lead.last_experience = Some(json!([{ "title": "Engineer" }]));
        let new_profile = json!({ "full_name": "A", "last_experience": [{ "title": "Senior Engineer" }] });
        let changes = diff_lead(&lead, &new_profile);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].title, "Experience Changed");
    }

    fn base_company() -> MonitoredCompany {
        MonitoredCompany {
            id: Uuid::new_v4(),
            reporter_user_id: Uuid::new_v4(),
            profile_url: "https://linkedin.com/company/acme".into(),
            name: Some("Acme".into()),
            tagline: None,
            description: None,
            website: None,
            employee_range: None,
            employee_count_current: Some(100),
            employee_count_previous: None,
            employee_count_last_checked_at: None,
            followers_count_current: Some(500),
            followers_count_previous: None,
            followers_count_last_checked_at: None,
            industry: None,
            hq_location: None,
            logo_url: None,
            last_profile_hash: None,
            last_7_posts_ids: json!([]),
            is_paused: false,
            last_fetched_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn company_field_change_produces_one_alert_each_no_fallthrough() {
        let company = base_company();
        let new_profile = json!({ "name": "Acme", "industry": "Fintech", "hq_location": "NYC" });
        let changes = diff_company(&company, &new_profile);
        assert_eq!(changes.len(), 2);
        let titles: Vec<&str> = changes.iter().map(|c| c.title.as_str()).collect();
        assert!(titles.contains(&"Industry Changed"));
        assert!(titles.contains(&"HQ Location Changed"));
    }

    #[test]
    fn employee_count_change_is_medium_priority() {
        let company = base_company();
        let new_profile = json!({ "name": "Acme", "employee_count_current": 150 });
        let changes = diff_company(&company, &new_profile);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].title, "Employee Count Changed");
        assert_eq!(changes[0].priority, AlertPriority::Medium);
    }

    #[test]
    fn unchanged_employee_count_emits_nothing() {
        let company = base_company();
        let new_profile = json!({ "name": "Acme", "employee_count_current": 100 });
        assert!(diff_company(&company, &new_profile).is_empty());
    }
}
