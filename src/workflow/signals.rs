//! Stable wire strings for cross-boundary interaction with running
//! workflows. All control-plane traffic into a workflow goes through one
//! of these names — nothing shares memory between workflow and activity
//! code.

use serde::{Deserialize, Serialize};

use super::monitor_workflow::MonitorKind;

pub const PAUSE_CAMPAIGN: &str = "pause-campaign";
pub const RESUME_CAMPAIGN: &str = "resume-campaign";
pub const STOP_CAMPAIGN: &str = "stop-campaign";
pub const GET_CAMPAIGN_STATUS: &str = "get-campaign-status";

pub const PAUSE_LEAD_MONITORING: &str = "pause-lead-monitoring";
pub const RESUME_LEAD_MONITORING: &str = "resume-lead-monitoring";
pub const GET_MONITORING_STATUS: &str = "get-monitoring-status";

pub const PAUSE_COMPANY_MONITORING: &str = "pause-company-monitoring";
pub const RESUME_COMPANY_MONITORING: &str = "resume-company-monitoring";
pub const GET_COMPANY_MONITORING_STATUS: &str = "get-company-monitoring-status";

/// Signal delivered to a running workflow's mailbox. Signals are
/// fire-and-forget — they never carry a reply channel (spec GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PauseCampaign,
    ResumeCampaign,
    StopCampaign,
    PauseMonitoring,
    ResumeMonitoring,
}

impl Signal {
    /// `PauseMonitoring`/`ResumeMonitoring` are kind-agnostic variants
    /// (routing already happens through separate lead/company runtimes —
    /// see `api::monitors`), so the caller supplies which kind's wire
    /// string to report; campaign variants ignore `kind` entirely.
    #[must_use]
    pub fn wire_name(&self, kind: MonitorKind) -> &'static str {
        match self {
            Self::PauseCampaign => PAUSE_CAMPAIGN,
            Self::ResumeCampaign => RESUME_CAMPAIGN,
            Self::StopCampaign => STOP_CAMPAIGN,
            Self::PauseMonitoring => match kind {
                MonitorKind::Lead => PAUSE_LEAD_MONITORING,
                MonitorKind::Company => PAUSE_COMPANY_MONITORING,
            },
            Self::ResumeMonitoring => match kind {
                MonitorKind::Lead => RESUME_LEAD_MONITORING,
                MonitorKind::Company => RESUME_COMPANY_MONITORING,
            },
        }
    }
}

/// Snapshot returned by `get-campaign-status`. Queries never trigger
/// activity execution and must be safe to answer during replay (spec §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CampaignStatusSnapshot {
    pub is_paused: bool,
    pub is_running: bool,
}

impl CampaignStatusSnapshot {
    #[must_use]
    pub fn not_running() -> Self {
        Self { is_paused: false, is_running: false }
    }
}

/// Snapshot returned by `get-monitoring-status` / `get-company-monitoring-status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringStatusSnapshot {
    pub id: String,
    pub is_paused: bool,
    pub is_running: bool,
}

impl MonitoringStatusSnapshot {
    #[must_use]
    pub fn not_running(id: impl Into<String>) -> Self {
        Self { id: id.into(), is_paused: false, is_running: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wire_names_match_spec_strings() {
        assert_eq!(Signal::PauseCampaign.wire_name(MonitorKind::Lead), "pause-campaign");
        assert_eq!(Signal::ResumeCampaign.wire_name(MonitorKind::Lead), "resume-campaign");
        assert_eq!(Signal::StopCampaign.wire_name(MonitorKind::Lead), "stop-campaign");
    }

    #[test]
    fn monitoring_wire_names_depend_on_kind() {
        assert_eq!(Signal::PauseMonitoring.wire_name(MonitorKind::Lead), "pause-lead-monitoring");
        assert_eq!(Signal::PauseMonitoring.wire_name(MonitorKind::Company), "pause-company-monitoring");
        assert_eq!(Signal::ResumeMonitoring.wire_name(MonitorKind::Lead), "resume-lead-monitoring");
        assert_eq!(Signal::ResumeMonitoring.wire_name(MonitorKind::Company), "resume-company-monitoring");
    }

    #[test]
    fn not_running_snapshot_is_not_paused() {
        let snapshot = CampaignStatusSnapshot::not_running();
        assert!(!snapshot.is_running);
        assert!(!snapshot.is_paused);
    }
}
