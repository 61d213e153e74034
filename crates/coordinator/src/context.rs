//! Per-event pipeline state.

use serde::Serialize;
use tracing::debug;
use triagebot_common::{
    ClassificationResult, DuplicateMatch, ResponseResult, RoutingResult, SimilarityResult,
};

/// Stages of one pipeline run, in order. `Done` and `Ignored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Classified,
    DuplicateChecked,
    Routed,
    Labeled,
    Responded,
    Commented,
    Done,
    Ignored,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Ignored)
    }
}

/// Accumulates stage outputs for a single event. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    pub issue_number: Option<u64>,
    pub stage: PipelineStage,
    pub classification: Option<ClassificationResult>,
    pub similarity: Option<SimilarityResult>,
    pub routing: Option<RoutingResult>,
    pub response: Option<ResponseResult>,
    /// Likely duplicates, set only when the similarity check found some
    pub duplicates: Vec<DuplicateMatch>,
    pub label_applied: bool,
    pub comment_posted: bool,
    pub ignored_reason: Option<String>,
}

impl PipelineContext {
    pub fn new(issue_number: Option<u64>) -> Self {
        Self {
            issue_number,
            stage: PipelineStage::Received,
            classification: None,
            similarity: None,
            routing: None,
            response: None,
            duplicates: Vec::new(),
            label_applied: false,
            comment_posted: false,
            ignored_reason: None,
        }
    }

    /// Move forward to `next`. Returns false, leaving the stage unchanged,
    /// when `next` is not after the current stage or the run has ended.
    pub fn advance(&mut self, next: PipelineStage) -> bool {
        if self.stage.is_terminal() || next <= self.stage {
            debug!(from = ?self.stage, to = ?next, "Rejected pipeline stage transition");
            return false;
        }
        debug!(issue = ?self.issue_number, from = ?self.stage, to = ?next, "Pipeline stage");
        self.stage = next;
        true
    }

    /// End the run early. Only valid before any agent has run.
    pub fn ignore(&mut self, reason: impl Into<String>) -> bool {
        if self.stage != PipelineStage::Received {
            return false;
        }
        self.ignored_reason = Some(reason.into());
        self.stage = PipelineStage::Ignored;
        true
    }

    pub fn is_done(&self) -> bool {
        self.stage == PipelineStage::Done
    }

    pub fn is_ignored(&self) -> bool {
        self.stage == PipelineStage::Ignored
    }
}
