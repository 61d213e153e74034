//! Triage agents.
//!
//! Each agent handles one stage of the pipeline and never fails: gateway
//! and parse errors are turned into the agent's fallback value at its
//! boundary.
//!
//! - **ClassifierAgent**: issue → category, confidence, reasoning
//! - **SimilarityAgent**: issue → likely duplicates; indexes the issue
//! - **RouterAgent**: (issue, category) → owning team
//! - **ResponderAgent**: (issue, category, team) → reply text
//!
//! ```text
//!   Issue ──► Classifier ──► Similarity ──► Router ──► Responder
//!                │               │             │           │
//!                ▼               ▼             ▼           ▼
//!          LlmClient   Embedder + VectorIndex  rules   LlmClient / templates
//! ```

pub mod classifier;
pub mod extract;
pub mod responder;
pub mod router;
pub mod similarity;

pub use classifier::{ClassifierAgent, parse_classification};
pub use extract::IssueSignals;
pub use responder::{ResponderAgent, render_template, template_for};
pub use router::{KeywordRoute, RouterAgent, RoutingRule, RoutingTable};
pub use similarity::{DuplicateRule, SimilarityAgent, SimilarityConfig};
