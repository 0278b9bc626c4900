pub mod alert;
pub mod campaign;
pub mod lead;
pub mod monitor;
pub mod user;

pub use alert::Alert;
pub use campaign::{Campaign, CampaignStatus};
pub use lead::{CampaignStep, Lead, LeadStatus};
pub use monitor::{MonitoredCompany, MonitoredLead};
