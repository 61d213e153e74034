//! End-to-end pipeline runs with in-process gateway doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use triagebot_agents::{
    ClassifierAgent, ResponderAgent, RouterAgent, SimilarityAgent, SimilarityConfig,
};
use triagebot_common::{Category, ClassificationResult, Issue, ResponseSource, Result, TriageError, TriageEvent};
use triagebot_coordinator::{Orchestrator, PipelineStage};
use triagebot_github::{Delivery, IssueTracker};
use triagebot_index::{DistanceMetric, Embedder, IndexConfig, InMemoryIndex, VectorIndex};
use triagebot_llm::{LlmClient, LlmRequest, LlmResponse};

const BUG_CLASSIFICATION: &str =
    r#"{"category": "bug", "confidence": 0.95, "reasoning": "User cannot log in"}"#;
const GENERATED_REPLY: &str = "Thanks for the report! The backend-team will take a look.";

/// Answers classification prompts with `classification` and anything else
/// with `reply`. `None` makes that kind of call fail.
struct ScriptedLlm {
    classification: Option<&'static str>,
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(classification: Option<&'static str>, reply: Option<&'static str>) -> Self {
        Self {
            classification,
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let classifying = request
            .system_prompt
            .as_deref()
            .is_some_and(|s| s.contains("classifying"));
        let scripted = if classifying {
            self.classification
        } else {
            self.reply
        };
        match scripted {
            Some(content) => Ok(LlmResponse {
                content: content.to_string(),
                model: "scripted".into(),
                usage: None,
                finish_reason: None,
            }),
            None => Err(TriageError::Gateway("503 Service Unavailable".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Three-dimensional bag of topics: login, dark mode, bias.
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let has = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
        Ok(vec![has("login"), has("dark"), 1.0])
    }

    fn dimension(&self) -> usize {
        3
    }
}

#[derive(Default)]
struct RecordingTracker {
    labels: Mutex<Vec<(u64, Vec<String>)>>,
    comments: Mutex<Vec<(u64, String)>>,
    fail: bool,
    skip: bool,
}

impl RecordingTracker {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Behaves like a tracker without credentials.
    fn skipping() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    fn outcome(&self) -> Delivery {
        if self.skip { Delivery::Skipped } else { Delivery::Sent }
    }

    fn labels(&self) -> Vec<(u64, Vec<String>)> {
        self.labels.lock().unwrap().clone()
    }

    fn comments(&self) -> Vec<(u64, String)> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn add_labels(&self, issue: &Issue, labels: &[String]) -> Result<Delivery> {
        self.labels.lock().unwrap().push((issue.number, labels.to_vec()));
        if self.fail {
            return Err(TriageError::ExternalService("GitHub labels failed with 403".into()));
        }
        Ok(self.outcome())
    }

    async fn post_comment(&self, issue: &Issue, body: &str) -> Result<Delivery> {
        self.comments.lock().unwrap().push((issue.number, body.to_string()));
        if self.fail {
            return Err(TriageError::ExternalService("GitHub comment failed with 502".into()));
        }
        Ok(self.outcome())
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    llm: Arc<ScriptedLlm>,
    tracker: Arc<RecordingTracker>,
    index: Arc<dyn VectorIndex>,
}

fn harness_with(llm: ScriptedLlm, tracker: RecordingTracker, index: Arc<dyn VectorIndex>) -> Harness {
    let llm = Arc::new(llm);
    let tracker = Arc::new(tracker);
    let orchestrator = Orchestrator::new(
        Arc::new(ClassifierAgent::new(llm.clone())),
        Arc::new(SimilarityAgent::new(
            Arc::new(TopicEmbedder),
            index.clone(),
            SimilarityConfig::default(),
        )),
        Arc::new(RouterAgent::default()),
        Arc::new(ResponderAgent::new(llm.clone())),
        tracker.clone(),
    );
    Harness {
        orchestrator: Arc::new(orchestrator),
        llm,
        tracker,
        index,
    }
}

fn harness(llm: ScriptedLlm) -> Harness {
    harness_with(
        llm,
        RecordingTracker::default(),
        Arc::new(InMemoryIndex::new(DistanceMetric::Cosine)),
    )
}

fn login_issue(id: u64, number: u64) -> Issue {
    let mut issue = Issue::new(id, number, "Login page is broken")
        .with_body("I cannot login when I click the button")
        .with_url(format!("https://api.github.com/repos/acme/app/issues/{number}"));
    issue.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    issue
}

#[tokio::test]
async fn opened_bug_is_labeled_routed_and_answered() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));
    let event = TriageEvent::new("opened", Some(login_issue(1001, 1)));

    let ctx = h.orchestrator.process(&event).await;

    assert_eq!(ctx.stage, PipelineStage::Done);
    let classification = ctx.classification.as_ref().unwrap();
    assert_eq!(classification.category, Category::Bug);
    assert!((classification.confidence - 0.95).abs() < 1e-6);
    assert_eq!(ctx.routing.as_ref().unwrap().team, "backend-team");

    assert_eq!(h.tracker.labels(), vec![(1, vec!["triage/bug".to_string()])]);
    assert!(ctx.label_applied);

    let comments = h.tracker.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].1, GENERATED_REPLY);
    assert!(ctx.comment_posted);
    assert_eq!(ctx.response.as_ref().unwrap().source, ResponseSource::Generated);

    assert!(!ctx.similarity.as_ref().unwrap().is_duplicate);
    assert_eq!(h.index.len().await, 1);
    assert_eq!(h.llm.calls(), 2);
}

#[tokio::test]
async fn reopened_is_processed() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("reopened", Some(login_issue(1001, 1))))
        .await;
    assert!(ctx.is_done());
}

#[tokio::test]
async fn closed_event_is_ignored_before_any_agent_runs() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("closed", Some(login_issue(1001, 1))))
        .await;

    assert_eq!(ctx.stage, PipelineStage::Ignored);
    assert_eq!(ctx.ignored_reason.as_deref(), Some("Action closed not supported"));
    assert!(ctx.classification.is_none());
    assert_eq!(h.llm.calls(), 0);
    assert!(h.tracker.labels().is_empty());
    assert!(h.tracker.comments().is_empty());
    assert_eq!(h.index.len().await, 0);
}

#[tokio::test]
async fn event_without_issue_is_ignored() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));
    let ctx = h.orchestrator.process(&TriageEvent::new("opened", None)).await;

    assert!(ctx.is_ignored());
    assert_eq!(ctx.ignored_reason.as_deref(), Some("Not an issue event"));
    assert_eq!(h.llm.calls(), 0);
}

#[tokio::test]
async fn tracker_failures_do_not_stop_the_run() {
    let h = harness_with(
        ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)),
        RecordingTracker::failing(),
        Arc::new(InMemoryIndex::new(DistanceMetric::Cosine)),
    );
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(login_issue(1001, 1))))
        .await;

    assert_eq!(ctx.stage, PipelineStage::Done);
    assert!(!ctx.label_applied);
    assert!(!ctx.comment_posted);
    // The comment is still attempted after the label call failed.
    assert_eq!(h.tracker.labels().len(), 1);
    assert_eq!(h.tracker.comments().len(), 1);
}

#[tokio::test]
async fn skipped_tracker_calls_are_not_recorded_as_applied() {
    let h = harness_with(
        ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)),
        RecordingTracker::skipping(),
        Arc::new(InMemoryIndex::new(DistanceMetric::Cosine)),
    );
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(login_issue(1001, 1))))
        .await;

    assert_eq!(ctx.stage, PipelineStage::Done);
    assert!(!ctx.label_applied);
    assert!(!ctx.comment_posted);
    assert_eq!(h.tracker.labels().len(), 1);
    assert_eq!(h.tracker.comments().len(), 1);
}

#[tokio::test]
async fn generation_outage_uses_fallbacks_end_to_end() {
    let h = harness(ScriptedLlm::new(None, None));
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(login_issue(1001, 1))))
        .await;

    assert_eq!(ctx.stage, PipelineStage::Done);
    assert_eq!(ctx.classification, Some(ClassificationResult::failed()));
    assert_eq!(ctx.routing.as_ref().unwrap().team, "triage-team");
    assert_eq!(h.tracker.labels()[0].1, vec!["triage/question".to_string()]);

    let response = ctx.response.as_ref().unwrap();
    assert_eq!(response.source, ResponseSource::Templated);
    assert!(response.text.contains("triage-team"));
    assert_eq!(h.tracker.comments()[0].1, response.text);
}

#[tokio::test]
async fn duplicates_are_attached_without_changing_routing() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));

    let first = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(login_issue(1001, 1))))
        .await;
    assert!(first.duplicates.is_empty());

    let mut second_issue = login_issue(1002, 2);
    second_issue.title = "Login button does nothing".into();
    let second = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(second_issue)))
        .await;

    assert!(second.similarity.as_ref().unwrap().is_duplicate);
    assert_eq!(second.duplicates.len(), 1);
    assert_eq!(second.duplicates[0].number, 1);
    assert_eq!(second.routing, first.routing);
    assert_eq!(second.stage, PipelineStage::Done);

    let unrelated = Issue::new(1003, 3, "Add dark mode").with_body("Please support a dark theme");
    let third = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(unrelated)))
        .await;
    assert!(third.duplicates.is_empty());
    assert_eq!(h.index.len().await, 3);
}

#[tokio::test]
async fn index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexConfig {
        metric: DistanceMetric::Cosine,
        persist_path: Some(dir.path().join("index.json")),
    };

    {
        let index = Arc::new(InMemoryIndex::open(&config).await.unwrap());
        let h = harness_with(
            ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)),
            RecordingTracker::default(),
            index,
        );
        h.orchestrator
            .process(&TriageEvent::new("opened", Some(login_issue(1001, 1))))
            .await;
    }

    let index = Arc::new(InMemoryIndex::open(&config).await.unwrap());
    assert_eq!(index.len().await, 1);
    let h = harness_with(
        ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)),
        RecordingTracker::default(),
        index,
    );
    let ctx = h
        .orchestrator
        .process(&TriageEvent::new("opened", Some(login_issue(1002, 2))))
        .await;
    assert_eq!(ctx.duplicates.len(), 1);
    assert_eq!(ctx.duplicates[0].id, "1001");
}

#[tokio::test]
async fn concurrent_runs_complete_independently() {
    let h = harness(ScriptedLlm::new(Some(BUG_CLASSIFICATION), Some(GENERATED_REPLY)));

    let handles: Vec<_> = (1..=8u64)
        .map(|n| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move {
                let event = TriageEvent::new("opened", Some(login_issue(1000 + n, n)));
                orchestrator.process(&event).await
            })
        })
        .collect();

    for handle in handles {
        let ctx = handle.await.unwrap();
        assert_eq!(ctx.stage, PipelineStage::Done);
    }
    assert_eq!(h.index.len().await, 8);
    assert_eq!(h.tracker.labels().len(), 8);
    assert_eq!(h.tracker.comments().len(), 8);
}
