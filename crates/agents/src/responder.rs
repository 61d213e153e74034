//! Reply generation with per-category template fallback.

use std::sync::Arc;

use tracing::{info, warn};
use triagebot_common::{Category, Issue, ResponseResult, ResponseSource, Result, TriageError};
use triagebot_llm::{LlmClient, LlmRequest};

const SYSTEM_PROMPT: &str = "You are a helpful GitHub bot assistant replying to newly opened issues.";

const DEFAULT_PRIORITY: &str = "Normal";

const BUG_TEMPLATE: &str = "\
Thanks for reporting this bug! The {team} will investigate.
Priority: {priority}

To help us resolve this faster, please make sure the issue includes:
- Version information
- Steps to reproduce
- Expected vs actual behavior";

const FEATURE_TEMPLATE: &str = "\
Thanks for the suggestion! It has been added to the backlog and the {team} \
will review it in an upcoming planning session.";

const QUESTION_TEMPLATE: &str = "\
Thanks for asking! Someone from the {team} will get back to you.
In the meantime, please check the project documentation.";

const SECURITY_TEMPLATE: &str = "\
SECURITY ACKNOWLEDGEMENT: We have received your report and notified the {team}.
Please do NOT disclose this issue publicly until it is resolved.";

/// Template for a category. Categories without their own template use the
/// question template.
pub fn template_for(category: Category) -> &'static str {
    match category {
        Category::Bug => BUG_TEMPLATE,
        Category::Feature => FEATURE_TEMPLATE,
        Category::Security => SECURITY_TEMPLATE,
        Category::Question | Category::Docs => QUESTION_TEMPLATE,
    }
}

/// Fill a category template with the team and the default priority.
pub fn render_template(category: Category, team: &str) -> String {
    template_for(category)
        .replace("{team}", team)
        .replace("{priority}", DEFAULT_PRIORITY)
        .trim()
        .to_string()
}

pub struct ResponderAgent {
    llm: Arc<dyn LlmClient>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ResponderAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            temperature: Some(0.3),
            max_tokens: Some(512),
        }
    }

    /// Override generation settings; `None` keeps the agent default.
    pub fn with_generation(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature.or(self.temperature);
        self.max_tokens = max_tokens.or(self.max_tokens);
        self
    }

    /// Generate a reply, falling back to the category template. Never fails.
    pub async fn respond(&self, issue: &Issue, category: Category, team: &str) -> ResponseResult {
        info!(issue = issue.number, category = %category, team = %team, "Generating response");

        match self.generate(issue, category, team).await {
            Ok(text) => ResponseResult {
                text,
                source: ResponseSource::Generated,
            },
            Err(e) => {
                warn!(issue = issue.number, error = %e, "Response generation failed, using template");
                ResponseResult {
                    text: render_template(category, team),
                    source: ResponseSource::Templated,
                }
            }
        }
    }

    async fn generate(&self, issue: &Issue, category: Category, team: &str) -> Result<String> {
        let request = LlmRequest::single(
            Some(SYSTEM_PROMPT.to_string()),
            build_prompt(issue, category, team),
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.llm.complete(request).await?;
        if response.is_unavailable() {
            return Err(TriageError::Gateway(
                "Generation returned the unavailability marker".into(),
            ));
        }
        let text = response.content.trim();
        if text.is_empty() {
            return Err(TriageError::Gateway("Generation returned an empty reply".into()));
        }
        Ok(text.to_string())
    }
}

fn build_prompt(issue: &Issue, category: Category, team: &str) -> String {
    format!(
        "Issue Title: {}\n\
         Issue Body: {}\n\
         Category: {category}\n\
         Assigned Team: {team}\n\n\
         Write a polite, helpful reply to the issue author.\n\
         - Acknowledge the issue type ({category}).\n\
         - Mention that it has been routed to the {team}.\n\
         - Be concise and professional.\n\
         - Do not promise a specific timeline, only that someone will look at it.",
        issue.title,
        issue.body_text(),
    )
}
