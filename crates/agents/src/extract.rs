//! Signals pulled from free-form issue bodies.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid regex"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>()\[\]"'`]+"#).expect("valid regex"));

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_@/.])@([A-Za-z0-9](?:[A-Za-z0-9-]{0,38}))").expect("valid regex")
});

const ERROR_MARKERS: &[&str] = &["Exception", "Error", "Traceback", "panicked", "at "];

/// Error output, links and mentions found in an issue body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSignals {
    pub error_logs: Vec<String>,
    pub urls: Vec<String>,
    pub mentions: Vec<String>,
}

impl IssueSignals {
    pub fn extract(body: &str) -> Self {
        let error_logs = CODE_BLOCK
            .captures_iter(body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|block| ERROR_MARKERS.iter().any(|marker| block.contains(marker)))
            .map(str::to_string)
            .collect();

        let urls = URL
            .find_iter(body)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string())
            .collect();

        let mut seen = HashSet::new();
        let mentions = MENTION
            .captures_iter(body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect();

        Self {
            error_logs,
            urls,
            mentions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.error_logs.is_empty() && self.urls.is_empty() && self.mentions.is_empty()
    }

    /// Prompt fragment quoting up to `max_logs` error excerpts of at most
    /// `max_chars` characters each. Empty when there is no error output.
    pub fn error_hint(&self, max_logs: usize, max_chars: usize) -> String {
        if self.error_logs.is_empty() {
            return String::new();
        }
        let excerpts: Vec<String> = self
            .error_logs
            .iter()
            .take(max_logs)
            .map(|log| match log.char_indices().nth(max_chars) {
                Some((idx, _)) => format!("{}...", &log[..idx]),
                None => log.clone(),
            })
            .collect();
        format!(
            "The issue includes error output:\n{}",
            excerpts
                .iter()
                .map(|e| format!("---\n{e}\n---"))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}
