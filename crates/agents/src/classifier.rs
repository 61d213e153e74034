//! Issue classification through the text-generation gateway.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};
use triagebot_common::{Category, ClassificationResult, Issue, Result, TriageError};
use triagebot_llm::{LlmClient, LlmRequest};

use crate::extract::IssueSignals;

const SYSTEM_PROMPT: &str = "You are an expert at classifying GitHub issues. \
Respond ONLY with a JSON object, no other text.";

const MAX_ERROR_EXCERPTS: usize = 2;
const MAX_EXCERPT_CHARS: usize = 500;

/// Expected reply shape. Every field is optional so that a reply missing a
/// field still parses and falls back field by field.
#[derive(Debug, Deserialize)]
struct ClassificationReply {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

pub struct ClassifierAgent {
    llm: Arc<dyn LlmClient>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ClassifierAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            temperature: Some(0.1),
            max_tokens: Some(512),
        }
    }

    /// Override generation settings; `None` keeps the agent default.
    pub fn with_generation(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature.or(self.temperature);
        self.max_tokens = max_tokens.or(self.max_tokens);
        self
    }

    /// Classify an issue. Never fails: any gateway or parse failure yields
    /// [`ClassificationResult::failed`].
    pub async fn classify(&self, issue: &Issue) -> ClassificationResult {
        info!(issue = issue.number, "Classifying issue");
        match self.try_classify(issue).await {
            Ok(result) => {
                info!(
                    issue = issue.number,
                    category = %result.category,
                    confidence = result.confidence,
                    "Classified issue"
                );
                result
            }
            Err(e @ TriageError::Gateway(_)) => {
                warn!(issue = issue.number, error = %e, "Classification gateway unavailable, using default");
                ClassificationResult::failed()
            }
            Err(e) => {
                warn!(issue = issue.number, error = %e, "Classification reply unusable, using default");
                ClassificationResult::failed()
            }
        }
    }

    async fn try_classify(&self, issue: &Issue) -> Result<ClassificationResult> {
        let request = LlmRequest::single(Some(SYSTEM_PROMPT.to_string()), build_prompt(issue))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.llm.complete(request).await?;
        if response.is_unavailable() {
            return Err(TriageError::Gateway(
                "Generation returned the unavailability marker".into(),
            ));
        }
        debug!(issue = issue.number, reply = %response.content, "Classifier reply");
        parse_classification(&response.content)
    }
}

fn build_prompt(issue: &Issue) -> String {
    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let body = match issue.body.as_deref().map(str::trim) {
        Some(b) if !b.is_empty() => b,
        _ => "No description provided.",
    };
    let signals = IssueSignals::extract(issue.body_text());
    if !signals.is_empty() {
        debug!(
            issue = issue.number,
            error_logs = signals.error_logs.len(),
            urls = ?signals.urls,
            mentions = ?signals.mentions,
            "Issue signals"
        );
    }
    let hint = signals.error_hint(MAX_ERROR_EXCERPTS, MAX_EXCERPT_CHARS);

    let mut prompt = format!(
        "Categories: {categories}\n\n\
         Analyze the following issue and respond with a JSON object containing:\n\
         1. \"category\": the best matching category from the list above.\n\
         2. \"confidence\": a number between 0.0 and 1.0.\n\
         3. \"reasoning\": a brief explanation of the choice.\n\n\
         Issue Title: {}\n\nIssue Body:\n{body}\n",
        issue.title
    );
    if !hint.is_empty() {
        prompt.push('\n');
        prompt.push_str(&hint);
        prompt.push('\n');
    }
    prompt
}

/// Remove a surrounding markdown code fence, with or without a `json` tag.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// First balanced `{...}` in a string that may carry surrounding prose.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a generated classification.
///
/// A reply that is not a JSON object is a [`TriageError::Parse`]. A parsed
/// object whose category is missing or outside the fixed set becomes
/// `question`, keeping whatever confidence and reasoning it carried.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult> {
    let cleaned = strip_code_fence(raw);
    let reply: ClassificationReply = match serde_json::from_str(cleaned) {
        Ok(reply) => reply,
        Err(first_err) => {
            let object = extract_json_object(cleaned).ok_or_else(|| {
                TriageError::Parse(format!(
                    "No JSON object in reply ({first_err}): {}",
                    cleaned.chars().take(200).collect::<String>()
                ))
            })?;
            serde_json::from_str(object)
                .map_err(|e| TriageError::Parse(format!("Invalid classification JSON: {e}")))?
        }
    };

    let category = match reply.category.as_deref().and_then(Category::from_label) {
        Some(category) => category,
        None => {
            warn!(
                category = ?reply.category,
                "Category outside the known set, defaulting to question"
            );
            Category::Question
        }
    };

    Ok(ClassificationResult::new(
        category,
        reply.confidence.unwrap_or(0.0) as f32,
        reply.reasoning,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use triagebot_llm::{LlmResponse, UNAVAILABLE_MARKER};

    struct ScriptedLlm(std::result::Result<&'static str, &'static str>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            match self.0 {
                Ok(content) => Ok(LlmResponse {
                    content: content.to_string(),
                    model: "scripted".into(),
                    usage: None,
                    finish_reason: None,
                }),
                Err(msg) => Err(TriageError::Gateway(msg.to_string())),
            }
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn issue() -> Issue {
        Issue::new(1, 1, "Login failed").with_body("I cannot login")
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn extract_json_object_ignores_braces_in_strings() {
        let input = r#"Sure: {"reasoning": "uses {braces}", "category": "bug"} done"#;
        assert_eq!(
            extract_json_object(input),
            Some(r#"{"reasoning": "uses {braces}", "category": "bug"}"#)
        );
        assert_eq!(extract_json_object(r#"{"category": "bug""#), None);
        assert_eq!(extract_json_object("no json"), None);
    }

    #[test]
    fn parses_well_formed_reply() {
        let result =
            parse_classification(r#"{"category": "bug", "confidence": 0.9, "reasoning": "Crash"}"#)
                .unwrap();
        assert_eq!(result.category, Category::Bug);
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.reasoning.as_deref(), Some("Crash"));
    }

    #[test]
    fn parses_fenced_reply_with_prose() {
        let result = parse_classification(
            "```json\nHere you go: {\"category\": \"docs\", \"confidence\": 0.7}\n```",
        )
        .unwrap();
        assert_eq!(result.category, Category::Docs);
    }

    #[test]
    fn unknown_category_becomes_question_and_keeps_values() {
        let result =
            parse_classification(r#"{"category": "enhancement", "confidence": 0.8, "reasoning": "r"}"#)
                .unwrap();
        assert_eq!(result.category, Category::Question);
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(result.reasoning.as_deref(), Some("r"));
    }

    #[test]
    fn missing_fields_default() {
        let result = parse_classification("{}").unwrap();
        assert_eq!(result.category, Category::Question);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reasoning.is_none());
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let high = parse_classification(r#"{"category": "bug", "confidence": 7.5}"#).unwrap();
        assert_eq!(high.confidence, 1.0);
        let low = parse_classification(r#"{"category": "bug", "confidence": -1}"#).unwrap();
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn malformed_reply_is_parse_error() {
        assert!(matches!(
            parse_classification("I think this is a bug."),
            Err(TriageError::Parse(_))
        ));
        assert!(matches!(
            parse_classification(r#"{"category": "bug", "confidence": "high"}"#),
            Err(TriageError::Parse(_))
        ));
        assert!(matches!(
            parse_classification(r#"["bug"]"#),
            Err(TriageError::Parse(_))
        ));
    }

    #[test]
    fn prompt_lists_categories_and_issue() {
        let prompt = build_prompt(&issue());
        assert!(prompt.contains("bug, feature, question, docs, security"));
        assert!(prompt.contains("Issue Title: Login failed"));
        assert!(prompt.contains("I cannot login"));

        let empty = build_prompt(&Issue::new(2, 2, "Untitled"));
        assert!(empty.contains("No description provided."));
    }

    #[test]
    fn prompt_includes_error_output_hint() {
        let issue = Issue::new(3, 3, "Crash")
            .with_body("```\nError: connection refused\n```");
        assert!(build_prompt(&issue).contains("error output"));
    }

    #[tokio::test]
    async fn classify_success() {
        let agent = ClassifierAgent::new(Arc::new(ScriptedLlm(Ok(
            r#"{"category": "bug", "confidence": 0.9}"#,
        ))));
        let result = agent.classify(&issue()).await;
        assert_eq!(result.category, Category::Bug);
        assert!((result.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn gateway_failure_falls_back() {
        let agent = ClassifierAgent::new(Arc::new(ScriptedLlm(Err("API Error"))));
        assert_eq!(agent.classify(&issue()).await, ClassificationResult::failed());
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back() {
        let agent = ClassifierAgent::new(Arc::new(ScriptedLlm(Ok("definitely a bug"))));
        assert_eq!(agent.classify(&issue()).await, ClassificationResult::failed());
    }

    #[tokio::test]
    async fn unavailability_marker_falls_back() {
        let agent = ClassifierAgent::new(Arc::new(ScriptedLlm(Ok(UNAVAILABLE_MARKER))));
        assert_eq!(agent.classify(&issue()).await, ClassificationResult::failed());
    }
}
