use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::ActivityError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub summary: String,
    pub is_critical: bool,
}

/// AI classification of a new post's text, used to pick the alert
/// priority (HIGH if `is_critical`, else LOW — spec §4.6).
#[async_trait]
pub trait PostSummarizer: Send + Sync {
    async fn summarize_post(&self, text: &str) -> Result<PostSummary, ActivityError>;
}

pub struct HttpPostSummarizer {
    http: Client,
    base_url: String,
}

impl HttpPostSummarizer {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PostSummarizer for HttpPostSummarizer {
    async fn summarize_post(&self, text: &str) -> Result<PostSummary, ActivityError> {
        let resp = self
            .http
            .post(format!("{}/summarize", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| ActivityError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ActivityError::Transient(format!(
                "summarizer returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| ActivityError::Transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSummarizer;

    #[async_trait]
    impl PostSummarizer for StubSummarizer {
        async fn summarize_post(&self, text: &str) -> Result<PostSummary, ActivityError> {
            Ok(PostSummary {
                summary: format!("summary of: {text}"),
                is_critical: text.contains("layoffs"),
            })
        }
    }

    #[tokio::test]
    async fn stub_marks_layoff_posts_critical() {
        let stub = StubSummarizer;
        let out = stub.summarize_post("announcing layoffs today").await.unwrap();
        assert!(out.is_critical);
    }

    #[tokio::test]
    async fn stub_marks_routine_posts_non_critical() {
        let stub = StubSummarizer;
        let out = stub.summarize_post("excited to share our new logo").await.unwrap();
        assert!(!out.is_critical);
    }
}
