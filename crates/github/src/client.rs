use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use triagebot_common::{Issue, Result, TriageError};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Whether a tracker call reached the remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No credentials; the remote issue was left untouched.
    Skipped,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn add_labels(&self, issue: &Issue, labels: &[String]) -> Result<Delivery>;

    async fn post_comment(&self, issue: &Issue, body: &str) -> Result<Delivery>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Falls back to `GITHUB_TOKEN` when unset
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_user_agent() -> String {
    concat!("triagebot/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl GithubConfig {
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

/// GitHub REST client addressing issues by their API URL.
///
/// Without a token every call is skipped with a warning and reports
/// [`Delivery::Skipped`], so a bot running without credentials still triages
/// and logs.
pub struct GithubClient {
    http_client: reqwest::Client,
    has_token: bool,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        Self::with_token(config, config.resolve_token())
    }

    pub fn with_token(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| TriageError::Config(format!("Invalid GitHub user agent: {e}")))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(ref token) = token {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| TriageError::Config(format!("Invalid GitHub token: {e}")))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|e| TriageError::Config(format!("Failed to create GitHub client: {e}")))?;

        Ok(Self {
            http_client,
            has_token: token.is_some(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.has_token
    }

    fn issue_endpoint(issue: &Issue, suffix: &str) -> Result<String> {
        if issue.url.is_empty() {
            return Err(TriageError::ExternalService(format!(
                "Issue #{} has no API URL",
                issue.number
            )));
        }
        Ok(format!("{}/{suffix}", issue.url.trim_end_matches('/')))
    }

    async fn post(&self, url: &str, body: serde_json::Value, action: &str) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TriageError::ExternalService(format!("GitHub {action} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(TriageError::ExternalService(format!(
                "GitHub {action} failed with {status}: {body_text}"
            )));
        }
        debug!(url = %url, status = %status, "GitHub {action} succeeded");
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    async fn add_labels(&self, issue: &Issue, labels: &[String]) -> Result<Delivery> {
        if !self.has_token {
            warn!(issue = issue.number, "GitHub token not configured, skipping add labels");
            return Ok(Delivery::Skipped);
        }
        let url = Self::issue_endpoint(issue, "labels")?;
        self.post(&url, json!({ "labels": labels }), "add labels").await?;
        info!(issue = issue.number, labels = ?labels, "Added labels");
        Ok(Delivery::Sent)
    }

    async fn post_comment(&self, issue: &Issue, body: &str) -> Result<Delivery> {
        if !self.has_token {
            warn!(issue = issue.number, "GitHub token not configured, skipping post comment");
            return Ok(Delivery::Skipped);
        }
        let url = Self::issue_endpoint(issue, "comments")?;
        self.post(&url, json!({ "body": body }), "post comment").await?;
        info!(issue = issue.number, "Posted comment");
        Ok(Delivery::Sent)
    }
}
