//! Issue-tracker gateway for TriageBot.
//!
//! The pipeline only needs two side effects on the remote issue: apply
//! labels and post a comment. [`IssueTracker`] is that seam; [`GithubClient`]
//! implements it against the GitHub REST API.

pub mod client;

pub use client::{Delivery, GithubClient, GithubConfig, IssueTracker};
