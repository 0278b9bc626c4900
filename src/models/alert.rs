use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

impl AlertPriority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable (except `acknowledged`) record of a detected change or a new
/// post, surfaced to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub lead_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub reporter_user_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub acknowledged: bool,
    pub previous_value: Option<String>,
    pub updated_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    #[must_use]
    pub fn priority(&self) -> AlertPriority {
        match self.priority.as_str() {
            "HIGH" => AlertPriority::High,
            "MEDIUM" => AlertPriority::Medium,
            _ => AlertPriority::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_is_low_to_high() {
        assert!(AlertPriority::Low < AlertPriority::Medium);
        assert!(AlertPriority::Medium < AlertPriority::High);
    }

    #[test]
    fn priority_display_matches_wire_string() {
        assert_eq!(AlertPriority::High.to_string(), "HIGH");
    }
}
