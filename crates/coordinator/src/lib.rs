//! Triage pipeline coordinator.
//!
//! The [`Orchestrator`] takes one validated issue event through every stage
//! and drives the two tracker side effects:
//!
//! ```text
//! TriageEvent
//!      │ screen (opened / reopened with an issue)
//!      ▼
//! Received ─► Classified ─► DuplicateChecked ─► Routed ─► Labeled
//!                                                            │
//!                        Done ◄─ Commented ◄─ Responded ◄────┘
//! ```
//!
//! Stage outputs accumulate in a [`PipelineContext`] that lives for a single
//! run. [`TriageConfig`] is the top-level configuration file.

pub mod config;
pub mod context;
pub mod orchestrator;

pub use config::{ServerConfig, TriageConfig, WebhookConfig};
pub use context::{PipelineContext, PipelineStage};
pub use orchestrator::{Disposition, Orchestrator};
