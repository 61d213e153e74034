//! Common types shared across TriageBot crates.
//!
//! This crate holds the issue-tracker domain model, the result records each
//! triage stage produces, and the error taxonomy every other crate returns.

pub mod error;
pub mod issue;
pub mod results;

pub use error::{Result, TriageError};
pub use issue::{Issue, Repository, TriageEvent, User};
pub use results::{
    Category, ClassificationResult, DuplicateMatch, ResponseResult, ResponseSource,
    RoutingResult, SimilarityResult,
};
