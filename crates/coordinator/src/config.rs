//! Top-level TriageBot configuration.
//!
//! Loaded from one TOML file in which every section is optional. Secrets
//! left out of the file are read from the environment:
//!
//! - `GITHUB_WEBHOOK_SECRET` for `webhook.secret`
//! - `GITHUB_TOKEN` for `github.token`
//! - `GEMINI_API_KEY` / `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` for `llm.api_key`
//! - `TRIAGEBOT_INSECURE_SKIP_SIGNATURE=true` turns signature checks off
//!
//! On Unix the file must be a regular file that is not world-writable, and
//! must not be world-readable when it holds a secret.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;
use triagebot_agents::{RoutingTable, SimilarityConfig};
use triagebot_github::GithubConfig;
use triagebot_index::{EmbeddingConfig, IndexConfig};
use triagebot_llm::LlmConfig;

pub const WEBHOOK_SECRET_ENV: &str = "GITHUB_WEBHOOK_SECRET";
pub const INSECURE_SKIP_ENV: &str = "TRIAGEBOT_INSECURE_SKIP_SIGNATURE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub github: GithubConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub routing: RoutingTable,
}

fn default_app_name() -> String {
    "TriageBot".into()
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            log_level: None,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            similarity: SimilarityConfig::default(),
            github: GithubConfig::default(),
            webhook: WebhookConfig::default(),
            routing: RoutingTable::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Larger webhook bodies are rejected with 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret. Falls back to `GITHUB_WEBHOOK_SECRET`.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// Development only: accept unsigned webhook deliveries
    #[serde(default)]
    pub insecure_skip_verification: bool,
}

impl WebhookConfig {
    pub fn resolve_secret(&self) -> Option<String> {
        self.resolve_secret_with(|name| std::env::var(name).ok())
    }

    fn resolve_secret_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.secret
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| lookup(WEBHOOK_SECRET_ENV))
            .filter(|s| !s.is_empty())
    }

    pub fn skip_verification(&self) -> bool {
        self.skip_verification_with(|name| std::env::var(name).ok())
    }

    fn skip_verification_with(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        self.insecure_skip_verification
            || lookup(INSECURE_SKIP_ENV)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
    }
}

impl TriageConfig {
    /// Load and validate configuration from a TOML file, enforcing file
    /// permission rules on Unix.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_type(path)?;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;

        let secrets = config.inline_secrets();
        if !secrets.is_empty() {
            #[cfg(unix)]
            validate_secret_file_permissions(path)?;

            warn!(
                fields = ?secrets,
                "Secrets found in config file '{}'. Prefer environment variables \
                 (GITHUB_WEBHOOK_SECRET, GITHUB_TOKEN, GEMINI_API_KEY).",
                path.display()
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration without permission checks. For tests and
    /// already-validated files.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Names of secret fields set directly in the file.
    pub fn inline_secrets(&self) -> Vec<&'static str> {
        let set = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.is_empty());
        let mut found = Vec::new();
        if set(&self.webhook.secret) {
            found.push("webhook.secret");
        }
        if set(&self.github.token) {
            found.push("github.token");
        }
        if set(&self.llm.api_key) {
            found.push("llm.api_key");
        }
        found
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.routing.validate()?;
        if self.similarity.top_k == 0 {
            anyhow::bail!("similarity.top_k must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.similarity.threshold) {
            anyhow::bail!(
                "similarity.threshold must be within [0, 1], got {}",
                self.similarity.threshold
            );
        }
        if self.server.max_body_bytes == 0 {
            anyhow::bail!("server.max_body_bytes must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(unix)]
fn validate_config_file_type(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }
    Ok(())
}

#[cfg(unix)]
fn validate_secret_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permission_bits = std::fs::metadata(path)?.permissions().mode() & 0o777;

    if permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains a secret but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }
    if permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains a secret and is group-readable (mode {:04o}). \
             Consider: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }
    Ok(())
}
