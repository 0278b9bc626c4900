use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub profile_url: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    #[must_use]
    pub fn status(&self) -> LeadStatus {
        LeadStatus::from_str(&self.status)
    }

    #[must_use]
    pub fn workflow_id(&self) -> String {
        format!("lead-{}-{}", self.campaign_id, self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeadStatus {
    Queued,
    Processing,
    Failed,
    Completed,
}

impl LeadStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "failed" => Self::Failed,
            "completed" => Self::Completed,
            _ => Self::Queued,
        }
    }

    /// Failed is terminal; a lead never leaves it once set.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Completed)
    }
}

/// Append-only record of one executed (or no-op-skipped) node in a lead's
/// workflow run. `step_index` is the dequeue order, not the node's position
/// in the DAG's topological sort — two leads that visit the same DAG in a
/// different branch order will have different step_index sequences even
/// for nodes they share.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignStep {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub step_index: i32,
    pub node_id: String,
    pub action_type: Option<String>,
    pub input_config: serde_json::Value,
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            LeadStatus::Queued,
            LeadStatus::Processing,
            LeadStatus::Failed,
            LeadStatus::Completed,
        ] {
            assert_eq!(LeadStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn failed_and_completed_are_terminal() {
        assert!(LeadStatus::Failed.is_terminal());
        assert!(LeadStatus::Completed.is_terminal());
        assert!(!LeadStatus::Queued.is_terminal());
        assert!(!LeadStatus::Processing.is_terminal());
    }

    #[test]
    fn lead_workflow_id_includes_campaign_and_lead() {
        let campaign_id = Uuid::nil();
        let lead_id = Uuid::max();
        let lead = Lead {
            id: lead_id,
            campaign_id,
            profile_url: "https://linkedin.com/in/jane".into(),
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            company: None,
            status: "queued".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(lead.workflow_id(), format!("lead-{campaign_id}-{lead_id}"));
    }
}
