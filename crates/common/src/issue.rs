//! Issue-tracker event payloads.
//!
//! These mirror the subset of the GitHub `issues` webhook payload that the
//! triage pipeline reads. Unknown fields are ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actions that start a triage run.
pub const TRIGGER_ACTIONS: &[&str] = &["opened", "reopened"];

/// An issue author or event sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub id: u64,
}

/// An issue as received from the tracker.
///
/// Immutable for the duration of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker-wide numeric id
    pub id: u64,

    /// Per-repository sequence number (`#123`)
    pub number: u64,

    pub title: String,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default = "default_state")]
    pub state: String,

    #[serde(default)]
    pub user: User,

    /// API URL of the issue; label and comment calls are made relative to it
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub html_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_state() -> String {
    "open".into()
}

impl Issue {
    pub fn new(id: u64, number: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            number,
            title: title.into(),
            body: None,
            state: default_state(),
            user: User::default(),
            url: String::new(),
            html_url: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Title and body joined with a single space.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body_text())
    }
}

/// Repository context carried by an event. Not interpreted by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: u64,
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
}

/// An inbound issue event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageEvent {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub issue: Option<Issue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
}

impl TriageEvent {
    pub fn new(action: impl Into<String>, issue: Option<Issue>) -> Self {
        Self {
            action: action.into(),
            issue,
            repository: None,
            sender: None,
        }
    }

    pub fn is_trigger_action(&self) -> bool {
        TRIGGER_ACTIONS.contains(&self.action.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENED_PAYLOAD: &str = r#"{
        "action": "opened",
        "issue": {
            "id": 1001,
            "number": 42,
            "title": "Login page is broken",
            "body": "I cannot login when I click the button",
            "state": "open",
            "user": {"login": "octocat", "id": 1},
            "url": "https://api.github.com/repos/acme/widgets/issues/42",
            "html_url": "https://github.com/acme/widgets/issues/42",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z",
            "labels": []
        },
        "repository": {"id": 7, "full_name": "acme/widgets", "html_url": "https://github.com/acme/widgets"},
        "sender": {"login": "octocat", "id": 1}
    }"#;

    #[test]
    fn deserializes_github_issue_payload() {
        let event: TriageEvent = serde_json::from_str(OPENED_PAYLOAD).unwrap();
        assert_eq!(event.action, "opened");
        assert!(event.is_trigger_action());

        let issue = event.issue.unwrap();
        assert_eq!(issue.id, 1001);
        assert_eq!(issue.number, 42);
        assert_eq!(issue.user.login, "octocat");
        assert!(issue.created_at.is_some());
        assert_eq!(
            event.repository.map(|r| r.full_name).as_deref(),
            Some("acme/widgets")
        );
    }

    #[test]
    fn event_without_issue_deserializes() {
        let event: TriageEvent = serde_json::from_str(r#"{"action": "created"}"#).unwrap();
        assert!(event.issue.is_none());
        assert!(!event.is_trigger_action());
    }

    #[test]
    fn missing_body_is_none_and_text_joins_with_space() {
        let issue: Issue =
            serde_json::from_str(r#"{"id": 1, "number": 2, "title": "Crash"}"#).unwrap();
        assert!(issue.body.is_none());
        assert_eq!(issue.state, "open");
        assert_eq!(issue.text(), "Crash ");

        let issue = issue.with_body("on start");
        assert_eq!(issue.text(), "Crash on start");
    }

    #[test]
    fn reopened_is_a_trigger_closed_is_not() {
        assert!(TriageEvent::new("reopened", None).is_trigger_action());
        assert!(!TriageEvent::new("closed", None).is_trigger_action());
        assert!(!TriageEvent::new("", None).is_trigger_action());
    }
}
