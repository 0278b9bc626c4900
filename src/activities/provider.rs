use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ActivityError;

/// Outcome of one provider-affecting activity call (profile visit, like,
/// comment, connection request, follow-up, withdrawal, InMail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResult {
    pub success: bool,
    pub message: Option<String>,
    pub data: serde_json::Value,
}

impl ActivityResult {
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    #[must_use]
    pub fn ok_empty() -> Self {
        Self::ok(serde_json::Value::Null)
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn provider_id(&self) -> Option<String> {
        self.data
            .get("providerId")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    #[must_use]
    pub fn already_connected(&self) -> bool {
        self.data
            .get("alreadyConnected")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn provider_limit_error(&self) -> Option<i64> {
        let error = self.data.get("error")?;
        if error.get("type")?.as_str()? != "provider_limit_reached" {
            return None;
        }
        if !error
            .get("shouldRetry")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
        {
            return None;
        }
        Some(
            error
                .get("retryAfterHours")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(24),
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Accepted,
    Rejected,
    Pending,
}

/// Capability set the core treats provider calls through (spec §6). The
/// HTTP wiring to the actual LinkedIn-facing API is glue and lives behind
/// this trait so workflow code and tests never depend on `reqwest` or a
/// live network call directly, mirroring how the teacher's connector
/// modules (`github_connector`, `wellfound_connector`) wrap one external
/// API behind a typed client.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn verify_account(&self, account_id: Uuid) -> Result<Option<String>, ActivityError>;

    async fn profile_visit(
        &self,
        account_id: Uuid,
        identifier: &str,
    ) -> Result<ActivityResult, ActivityError>;

    async fn like_post(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn comment_post(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn send_connection_request(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn check_connection_status(
        &self,
        account_id: Uuid,
        identifier: &str,
        provider_id: &str,
    ) -> Result<ConnectionStatus, ActivityError>;

    async fn send_followup(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn withdraw_request(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn send_inmail(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError>;

    async fn fetch_profile(&self, profile_url: &str) -> Result<FetchedProfile, ActivityError>;

    async fn fetch_post(&self, post_id: &str) -> Result<String, ActivityError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedProfile {
    pub profile: serde_json::Value,
    pub posts: Vec<String>,
}

/// Default `ProviderClient` wired against the LinkedIn-facing provider
/// service over HTTP. Every call goes through `ActivityError::Transient`
/// on network failure so the caller's `RetryPolicy` can retry it.
pub struct LinkedInProviderClient {
    http: Client,
    base_url: String,
}

impl LinkedInProviderClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ActivityError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ActivityError::Transient(e.to_string()))?;

        if resp.status().is_client_error() {
            return Err(ActivityError::Validation(format!(
                "provider rejected request: {}",
                resp.status()
            )));
        }
        if !resp.status().is_success() {
            return Err(ActivityError::Transient(format!(
                "provider returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ActivityError::Transient(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for LinkedInProviderClient {
    async fn verify_account(&self, account_id: Uuid) -> Result<Option<String>, ActivityError> {
        let body = self
            .post_json("/accounts/verify", &serde_json::json!({ "accountId": account_id }))
            .await?;
        Ok(body.get("providerAccountId").and_then(|v| v.as_str()).map(str::to_owned))
    }

    async fn profile_visit(
        &self,
        account_id: Uuid,
        identifier: &str,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/profile-visit",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn like_post(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/like-post",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn comment_post(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/comment-post",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn send_connection_request(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/connection-request",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn check_connection_status(
        &self,
        account_id: Uuid,
        identifier: &str,
        provider_id: &str,
    ) -> Result<ConnectionStatus, ActivityError> {
        let body = self
            .post_json(
                "/actions/connection-status",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "providerId": provider_id }),
            )
            .await?;
        let status = body
            .get("data")
            .and_then(|d| d.get("status"))
            .and_then(|v| v.as_str())
            .unwrap_or("pending");
        Ok(match status {
            "accepted" => ConnectionStatus::Accepted,
            "rejected" => ConnectionStatus::Rejected,
            _ => ConnectionStatus::Pending,
        })
    }

    async fn send_followup(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/followup",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn withdraw_request(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/withdraw",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn send_inmail(
        &self,
        account_id: Uuid,
        identifier: &str,
        config: &serde_json::Value,
    ) -> Result<ActivityResult, ActivityError> {
        let body = self
            .post_json(
                "/actions/inmail",
                &serde_json::json!({ "accountId": account_id, "identifier": identifier, "config": config }),
            )
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_else(|_| ActivityResult::ok_empty()))
    }

    async fn fetch_profile(&self, profile_url: &str) -> Result<FetchedProfile, ActivityError> {
        let body = self
            .post_json("/profiles/fetch", &serde_json::json!({ "profileUrl": profile_url }))
            .await?;
        serde_json::from_value(body).map_err(|e| ActivityError::Transient(e.to_string()))
    }

    async fn fetch_post(&self, post_id: &str) -> Result<String, ActivityError> {
        let body = self
            .post_json("/posts/fetch", &serde_json::json!({ "postId": post_id }))
            .await?;
        Ok(body.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_owned())
    }
}

/// Deterministic string parse of a LinkedIn profile URL into the
/// provider's opaque identifier (the last non-empty path segment).
/// Returns `None` for malformed URLs — the caller treats that as a
/// non-retryable validation failure.
#[must_use]
pub fn extract_profile_identifier(url: &str) -> Option<String> {
    let re = Regex::new(r"^https?://(www\.)?linkedin\.com/(in|company)/([A-Za-z0-9\-_%]+)/?$")
        .expect("static regex is valid");
    re.captures(url.trim())
        .and_then(|caps| caps.get(3))
        .map(|m| m.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_identifier_from_profile_url() {
        assert_eq!(
            extract_profile_identifier("https://www.linkedin.com/in/jane-doe/"),
            Some("jane-doe".to_string())
        );
    }

    #[test]
    fn extracts_identifier_from_company_url() {
        assert_eq!(
            extract_profile_identifier("https://linkedin.com/company/acme-corp"),
            Some("acme-corp".to_string())
        );
    }

    #[test]
    fn rejects_malformed_url() {
        assert_eq!(extract_profile_identifier("not a url"), None);
        assert_eq!(extract_profile_identifier("https://example.com/in/jane"), None);
    }

    #[test]
    fn activity_result_reads_provider_id() {
        let result = ActivityResult::ok(serde_json::json!({ "providerId": "inv-123" }));
        assert_eq!(result.provider_id(), Some("inv-123".to_string()));
    }

    #[test]
    fn activity_result_reads_already_connected() {
        let result = ActivityResult::ok(serde_json::json!({ "alreadyConnected": true }));
        assert!(result.already_connected());
    }

    #[test]
    fn activity_result_reads_provider_limit_error() {
        let result = ActivityResult {
            success: false,
            message: None,
            data: serde_json::json!({
                "error": { "type": "provider_limit_reached", "shouldRetry": true, "retryAfterHours": 12 }
            }),
        };
        assert_eq!(result.provider_limit_error(), Some(12));
    }

    #[test]
    fn activity_result_ignores_non_limit_errors() {
        let result = ActivityResult {
            success: false,
            message: Some("nope".into()),
            data: serde_json::json!({ "error": { "type": "auth_failure" } }),
        };
        assert_eq!(result.provider_limit_error(), None);
    }

    #[test]
    fn activity_result_limit_error_defaults_to_24h() {
        let result = ActivityResult {
            success: false,
            message: None,
            data: serde_json::json!({
                "error": { "type": "provider_limit_reached", "shouldRetry": true }
            }),
        };
        assert_eq!(result.provider_limit_error(), Some(24));
    }
}
