use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A LinkedIn outreach campaign: a sending window, a sender account, a
/// prospect list, and a workflow definition that every lead in the list
/// walks through.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sender_account_id: Uuid,
    pub prospect_list_id: Uuid,
    pub window_start_time: String,
    pub window_end_time: String,
    pub window_timezone: String,
    pub leads_per_day: i32,
    pub workflow_definition_ref: String,
    pub status: String,
    pub max_concurrent_leads: i32,
    pub lead_processing_delay_secs: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// A campaign with status=active must have a workflow definition
    /// reference that resolves; callers enforce this before transitioning.
    #[must_use]
    pub fn can_activate(&self) -> bool {
        !self.workflow_definition_ref.trim().is_empty()
    }

    #[must_use]
    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::from_str(&self.status)
    }

    #[must_use]
    pub fn workflow_id(&self) -> String {
        format!("campaign-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl CampaignStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "stopped" => Self::Stopped,
            _ => Self::Draft,
        }
    }

    /// Terminal statuses end a lead's per-campaign processing: the parent
    /// and child workflows both exit when they observe one of these.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Allowed transitions: draft -> active <-> paused -> {completed, stopped, failed}.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        use CampaignStatus::{Active, Completed, Draft, Failed, Paused, Stopped};
        matches!(
            (*self, next),
            (Draft, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Active, Failed)
                | (Active, Stopped)
                | (Paused, Completed)
                | (Paused, Failed)
                | (Paused, Stopped)
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            CampaignStatus::Draft,
            CampaignStatus::Active,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
            CampaignStatus::Stopped,
        ] {
            assert_eq!(CampaignStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn draft_to_active_allowed() {
        assert!(CampaignStatus::Draft.can_transition_to(CampaignStatus::Active));
    }

    #[test]
    fn draft_to_paused_rejected() {
        assert!(!CampaignStatus::Draft.can_transition_to(CampaignStatus::Paused));
    }

    #[test]
    fn active_pause_resume_cycle() {
        assert!(CampaignStatus::Active.can_transition_to(CampaignStatus::Paused));
        assert!(CampaignStatus::Paused.can_transition_to(CampaignStatus::Active));
    }

    #[test]
    fn terminal_statuses() {
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
        assert!(CampaignStatus::Stopped.is_terminal());
        assert!(!CampaignStatus::Active.is_terminal());
        assert!(!CampaignStatus::Paused.is_terminal());
    }

    #[test]
    fn workflow_id_is_deterministic() {
        let id = Uuid::nil();
        let c = Campaign {
            id,
            organization_id: Uuid::nil(),
            name: "t".into(),
            description: None,
            sender_account_id: Uuid::nil(),
            prospect_list_id: Uuid::nil(),
            window_start_time: "09:00".into(),
            window_end_time: "17:00".into(),
            window_timezone: "UTC".into(),
            leads_per_day: 10,
            workflow_definition_ref: "workflows/org/camp.json".into(),
            status: "active".into(),
            max_concurrent_leads: 5,
            lead_processing_delay_secs: 30,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(c.workflow_id(), format!("campaign-{id}"));
        assert!(c.can_activate());
    }
}
