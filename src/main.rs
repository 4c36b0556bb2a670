mod anthropic;
mod completion;
mod compose;
mod config;
mod error;
mod logger;
mod models;
mod prompt;
mod router;
mod search;
mod stream;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use anthropic::AnthropicClient;
use completion::{Agent, Placeholder};
use config::AppConfig;
use router::{run_router, RouterState};
use search::GoogleSearch;
use stream::JitterPacer;
use tools::ToolCatalog;

#[derive(Parser)]
#[command(name = "luzia", about = "Fact-check chat endpoint that streams its answers")]
struct Cli {
  /// Address to bind
  #[arg(long, default_value = "127.0.0.1", env = "LUZIA_HOST")]
  host: String,

  /// Port to listen on
  #[arg(long, default_value_t = 3000, env = "LUZIA_PORT")]
  port: u16,

  /// Append log lines to this file instead of stderr
  #[arg(long, env = "LOG_FILE")]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Before clap, so flags can come from `.env` too.
  let _ = dotenvy::dotenv();
  let cli = Cli::parse();
  logger::init(cli.log_file.as_deref())?;

  let config = match AppConfig::from_env() {
    Ok(c) => c,
    Err(err) => {
      tracing::error!("{err}");
      std::process::exit(1);
    }
  };

  let client = config.http_client()?;
  let catalog = ToolCatalog::standard(&config, client.clone());
  tracing::info!(
    model = %config.anthropic.model,
    placeholder = %config.placeholder_model,
    search_enabled = config.search.enabled(),
    vector_store = %config.vector_store.url,
    vector_store_key_set = !config.vector_store.private_key.is_empty(),
    tools = ?catalog.names(),
    delay_ms = ?config.stream_delay_ms,
    upstream_timeout = ?config.upstream_timeout,
    max_request_bytes = config.max_request_bytes,
    "Luzia starting up"
  );

  let agent = Agent::new(
    Arc::new(GoogleSearch::new(client.clone(), config.search.clone())),
    AnthropicClient::new(client, config.anthropic.clone()),
    config.templates.clone(),
  );
  let (delay_min, delay_max) = config.stream_delay_ms;

  let state = RouterState {
    started_at: Instant::now(),
    started_at_utc: chrono::Utc::now(),
    placeholder_model: config.placeholder_model.clone(),
    catalog,
    placeholder: Arc::new(Placeholder),
    agent: Arc::new(agent),
    pacer: Arc::new(JitterPacer::new(delay_min, delay_max)),
    max_request_bytes: config.max_request_bytes,
  };

  let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
    .await
    .with_context(|| format!("cannot bind {}:{}", cli.host, cli.port))?;
  tracing::info!(addr = %listener.local_addr()?, "listening");

  run_router(listener, state).await
}
