use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::completion::{CompletionInput, CompletionSource};
use crate::compose;
use crate::error::ChatError;
use crate::models::ChatRequest;
use crate::stream::{self, text_stream_response, Pacer};
use crate::tools::ToolCatalog;

pub struct RouterState {
  pub started_at: Instant,
  pub started_at_utc: DateTime<Utc>,
  /// `selectedModel` value answered by `placeholder`.
  pub placeholder_model: String,
  pub catalog: ToolCatalog,
  pub placeholder: Arc<dyn CompletionSource>,
  pub agent: Arc<dyn CompletionSource>,
  pub pacer: Arc<dyn Pacer>,
  /// Body size cap for `/api/chat`; replaces axum's 2 MiB default.
  pub max_request_bytes: usize,
}

pub fn build_router(state: RouterState) -> Router {
  let body_limit = DefaultBodyLimit::max(state.max_request_bytes);
  Router::new()
    .route("/health", get(health))
    .route("/api/chat", post(chat).layer(body_limit))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .with_state(Arc::new(state))
}

pub async fn run_router(listener: tokio::net::TcpListener, state: RouterState) -> anyhow::Result<()> {
  let app = build_router(state);
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    tracing::error!("cannot listen for shutdown signal: {err}");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

async fn health(State(state): State<Arc<RouterState>>) -> Json<serde_json::Value> {
  let uptime = state.started_at.elapsed().as_millis();
  Json(serde_json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
    "uptime_ms": uptime,
    "started_at": state.started_at_utc.to_rfc3339(),
  }))
}

// The rejection is taken as a value so an oversized body still gets the JSON error shape.
async fn chat(
  State(state): State<Arc<RouterState>>,
  body: Result<Bytes, BytesRejection>,
) -> Result<Response, ChatError> {
  let request_id = uuid::Uuid::new_v4();
  let span = tracing::info_span!("chat", %request_id);
  let result = answer(state, body).instrument(span.clone()).await;
  if let Err(err) = &result {
    span.in_scope(|| tracing::warn!(code = err.code(), "chat failed: {err}"));
  }
  result
}

async fn answer(state: Arc<RouterState>, body: Result<Bytes, BytesRejection>) -> Result<Response, ChatError> {
  let body = body?;
  let req = ChatRequest::from_json(&body)?;
  let (source, input) = prepare(&state, &req)?;
  tracing::info!(
    variant = source.label(),
    model = %req.selected_model,
    vector_storage = ?req.selected_vector_storage,
    tools = input.tools.len(),
    files = req.files.len(),
    prompt_chars = input.argument.chars().count(),
    "completing"
  );

  // Own task: a caller hanging up must not cancel a completion in flight.
  let text = tokio::spawn(async move { source.complete(input).await })
    .await
    .map_err(|err| ChatError::Internal(format!("completion task failed: {err}")))??;

  tracing::info!(
    answer_chars = text.chars().count(),
    frames = stream::frames(&text).len(),
    "streaming answer"
  );
  Ok(text_stream_response(text, state.pacer.clone()))
}

/// Picks the completion source and, for the agent, builds its input.
fn prepare(state: &RouterState, req: &ChatRequest) -> Result<(Arc<dyn CompletionSource>, CompletionInput), ChatError> {
  if req.selected_model == state.placeholder_model {
    return Ok((state.placeholder.clone(), CompletionInput::default()));
  }

  let latest = req.latest_message()?.content.clone();
  let files = compose::decode_files(&req.files)?;
  let argument = compose::prompt_argument(&latest, &files);
  let tools = state.catalog.select(&req.functions)?;
  Ok((
    state.agent.clone(),
    CompletionInput {
      latest_message: latest,
      argument,
      tools,
    },
  ))
}
