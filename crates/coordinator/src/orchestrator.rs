//! Sequencing of the triage agents for one event.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use triagebot_agents::{ClassifierAgent, ResponderAgent, RouterAgent, SimilarityAgent};
use triagebot_common::{Issue, TriageEvent};
use triagebot_github::{Delivery, IssueTracker};

use crate::context::{PipelineContext, PipelineStage};

/// Outcome of screening an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Ignored { reason: String },
}

/// Runs classify → duplicate check → route → label → respond → comment.
///
/// Agents never fail; only the two tracker calls can, and their errors are
/// logged without stopping the run.
pub struct Orchestrator {
    classifier: Arc<ClassifierAgent>,
    similarity: Arc<SimilarityAgent>,
    router: Arc<RouterAgent>,
    responder: Arc<ResponderAgent>,
    tracker: Arc<dyn IssueTracker>,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<ClassifierAgent>,
        similarity: Arc<SimilarityAgent>,
        router: Arc<RouterAgent>,
        responder: Arc<ResponderAgent>,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            classifier,
            similarity,
            router,
            responder,
            tracker,
        }
    }

    /// Decide whether an event should start a pipeline run.
    pub fn screen(event: &TriageEvent) -> Disposition {
        if !event.is_trigger_action() {
            return Disposition::Ignored {
                reason: format!("Action {} not supported", event.action),
            };
        }
        if event.issue.is_none() {
            return Disposition::Ignored {
                reason: "Not an issue event".into(),
            };
        }
        Disposition::Accepted
    }

    /// Run the whole pipeline for one event and return the finished context.
    pub async fn process(&self, event: &TriageEvent) -> PipelineContext {
        let mut ctx = PipelineContext::new(event.issue.as_ref().map(|i| i.number));

        let issue = match (Self::screen(event), event.issue.as_ref()) {
            (Disposition::Accepted, Some(issue)) => issue,
            (Disposition::Ignored { reason }, _) => {
                info!(action = %event.action, reason = %reason, "Ignoring event");
                ctx.ignore(reason);
                return ctx;
            }
            (Disposition::Accepted, None) => {
                ctx.ignore("Not an issue event");
                return ctx;
            }
        };

        info!(issue = issue.number, action = %event.action, title = %issue.title, "Triage started");
        self.run(issue, &mut ctx).await;
        info!(
            issue = issue.number,
            stage = ?ctx.stage,
            label_applied = ctx.label_applied,
            comment_posted = ctx.comment_posted,
            "Triage finished"
        );
        ctx
    }

    async fn run(&self, issue: &Issue, ctx: &mut PipelineContext) {
        let classification = self.classifier.classify(issue).await;
        let category = classification.category;
        ctx.classification = Some(classification);
        ctx.advance(PipelineStage::Classified);

        let similarity = self.similarity.detect(issue).await;
        if similarity.is_duplicate {
            debug!(
                issue = issue.number,
                duplicates = similarity.duplicates.len(),
                "Attaching duplicates to context"
            );
            ctx.duplicates = similarity.duplicates.clone();
        }
        ctx.similarity = Some(similarity);
        ctx.advance(PipelineStage::DuplicateChecked);

        let routing = self.router.route(issue, category);
        let team = routing.team.clone();
        ctx.routing = Some(routing);
        ctx.advance(PipelineStage::Routed);

        let label = category.label();
        match self.tracker.add_labels(issue, std::slice::from_ref(&label)).await {
            Ok(Delivery::Sent) => {
                info!(issue = issue.number, label = %label, "Label applied");
                ctx.label_applied = true;
            }
            Ok(Delivery::Skipped) => {
                warn!(issue = issue.number, label = %label, "Label not applied, tracker skipped the call")
            }
            Err(e) => error!(issue = issue.number, label = %label, error = %e, "Failed to apply label"),
        }
        ctx.advance(PipelineStage::Labeled);

        let response = self.responder.respond(issue, category, &team).await;
        debug!(issue = issue.number, source = response.source.as_str(), "Response ready");
        let text = response.text.clone();
        ctx.response = Some(response);
        ctx.advance(PipelineStage::Responded);

        if text.is_empty() {
            warn!(issue = issue.number, "Empty response, not commenting");
        } else {
            match self.tracker.post_comment(issue, &text).await {
                Ok(Delivery::Sent) => {
                    info!(issue = issue.number, "Comment posted");
                    ctx.comment_posted = true;
                }
                Ok(Delivery::Skipped) => {
                    warn!(issue = issue.number, "Comment not posted, tracker skipped the call")
                }
                Err(e) => error!(issue = issue.number, error = %e, "Failed to post comment"),
            }
            ctx.advance(PipelineStage::Commented);
        }

        ctx.advance(PipelineStage::Done);
    }
}
