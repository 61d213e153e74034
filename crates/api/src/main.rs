//! TriageBot server binary.
//!
//! Usage:
//!   triagebot --config triagebot.toml
//!   triagebot --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `GITHUB_WEBHOOK_SECRET` - Shared webhook secret (required unless bypassed)
//! - `GITHUB_TOKEN` - Token used to label and comment on issues
//! - `GEMINI_API_KEY` / `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` - Provider key
//! - `TRIAGEBOT_INSECURE_SKIP_SIGNATURE` - Accept unsigned webhooks (development only)
//! - `RUST_LOG` - Log filter, overrides `log_level` from the config file

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use triagebot_agents::{ClassifierAgent, ResponderAgent, RouterAgent, SimilarityAgent};
use triagebot_api::{AppState, WebhookVerifier, serve};
use triagebot_common::TriageError;
use triagebot_coordinator::{Orchestrator, TriageConfig};
use triagebot_github::GithubClient;
use triagebot_index::{Embedder, InMemoryIndex, build_embedder};
use triagebot_llm::{LlmClient, UnavailableClient, build_llm_client};

const DEFAULT_LOG_FILTER: &str = "info,triagebot=debug,tower_http=debug";

struct Args {
    config_path: Option<String>,
    port: Option<u16>,
    bind: Option<String>,
}

fn print_help() {
    println!("TriageBot - automatic GitHub issue triage");
    println!();
    println!("Usage: triagebot [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>  Path to TOML config file");
    println!("  -p, --port <PORT>    Port to listen on (default: 8000)");
    println!("  -b, --bind <ADDR>    Bind address (default: 127.0.0.1)");
    println!("  -h, --help           Show this help message");
    println!();
    println!("Environment variables:");
    println!("  GITHUB_WEBHOOK_SECRET              Webhook HMAC secret");
    println!("  GITHUB_TOKEN                       Token for labels and comments");
    println!("  GEMINI_API_KEY                     Gemini API key (default provider)");
    println!("  OPENAI_API_KEY / ANTHROPIC_API_KEY Keys for other providers");
    println!("  TRIAGEBOT_INSECURE_SKIP_SIGNATURE  Accept unsigned webhooks (development only)");
    println!("  RUST_LOG                           Log filter");
}

/// `Ok(None)` means help was printed.
fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        config_path: None,
        port: None,
        bind: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                args.config_path = Some(iter.next().context("--config requires a value")?);
            }
            "--port" | "-p" => {
                let value = iter.next().context("--port requires a value")?;
                args.port = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid port number: {value}"))?,
                );
            }
            "--bind" | "-b" => {
                args.bind = Some(iter.next().context("--bind requires a value")?);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => anyhow::bail!("Unknown argument: {other} (see --help)"),
        }
    }
    Ok(Some(args))
}

fn init_logging(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| match config_level {
            Some(level) => EnvFilter::try_new(level),
            None => EnvFilter::try_new(DEFAULT_LOG_FILTER),
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let config = match args.config_path {
        Some(ref path) => TriageConfig::from_file(path)?,
        None => TriageConfig::default(),
    };

    init_logging(config.log_level.as_deref());
    match args.config_path {
        Some(ref path) => info!(path = %path, "Loaded configuration"),
        None => info!("Using default configuration"),
    }

    let verifier = match config.webhook.resolve_secret() {
        Some(secret) => WebhookVerifier::new(secret, config.server.max_body_bytes),
        None if config.webhook.skip_verification() => {
            warn!(
                "Webhook signature verification is DISABLED. Anyone who can reach this \
                 server can trigger triage runs. Never use this outside development."
            );
            WebhookVerifier::insecure(config.server.max_body_bytes)
        }
        None => {
            return Err(TriageError::Config(
                "No webhook secret configured. Set GITHUB_WEBHOOK_SECRET or webhook.secret, \
                 or TRIAGEBOT_INSECURE_SKIP_SIGNATURE=true for local development."
                    .into(),
            )
            .into());
        }
    };

    let llm: Arc<dyn LlmClient> = match build_llm_client(&config.llm) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Text generation unavailable, agents will use fallbacks");
            Arc::new(UnavailableClient::new(e.to_string()))
        }
    };

    let embedder = build_embedder(&config.embedding);
    if let Err(e) = embedder.warmup().await {
        warn!(error = %e, "Embedding model warmup failed, will retry on first issue");
    }
    let embedding_enabled = embedder.dimension() > 0;

    let index = InMemoryIndex::open(&config.index)
        .await
        .context("Failed to open issue index")?;

    let github = GithubClient::new(&config.github)?;
    if !github.has_token() {
        warn!("GITHUB_TOKEN not set, labels and comments will be skipped");
    }

    let orchestrator = Orchestrator::new(
        Arc::new(
            ClassifierAgent::new(llm.clone())
                .with_generation(config.llm.temperature, config.llm.max_tokens),
        ),
        Arc::new(SimilarityAgent::new(
            embedder,
            Arc::new(index),
            config.similarity.clone(),
        )),
        Arc::new(RouterAgent::new(config.routing.clone())),
        Arc::new(
            ResponderAgent::new(llm.clone())
                .with_generation(config.llm.temperature, config.llm.max_tokens),
        ),
        Arc::new(github),
    );

    let state = AppState::new(
        Arc::new(orchestrator),
        config.app_name.clone(),
        llm.model_name(),
        embedding_enabled,
    );

    let host = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let port = args.port.unwrap_or(config.server.port);
    if host == "0.0.0.0" {
        warn!("Server binding to 0.0.0.0, the webhook endpoint is exposed on all interfaces");
    }
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {host}:{port}"))?;

    serve(Arc::new(state), verifier, addr).await
}
