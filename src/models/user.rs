use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Dashboard operator account. Authentication itself is out of core scope
/// (see spec §1); this type exists only so `api::auth` and
/// `middleware::auth` have something concrete to issue JWTs against.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}
