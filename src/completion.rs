use std::sync::Arc;

use crate::anthropic::AnthropicClient;
use crate::error::ChatError;
use crate::prompt::{PromptTemplates, PromptVars};
use crate::search::WebSearch;
use crate::tools::ToolSelection;

pub const PLACEHOLDER_ANSWER: &str = "This is an example response from the Claude model.";

/// What a completion source gets for one request.
#[derive(Clone, Default)]
pub struct CompletionInput {
  pub latest_message: String,
  /// The latest message, possibly wrapped with uploaded file text.
  pub argument: String,
  pub tools: ToolSelection,
}

/// Produces the full answer for one request.
#[async_trait::async_trait]
pub trait CompletionSource: Send + Sync {
  fn label(&self) -> &'static str;
  async fn complete(&self, input: CompletionInput) -> Result<String, ChatError>;
}

/// Canned answer for smoke tests; never touches the network.
pub struct Placeholder;

#[async_trait::async_trait]
impl CompletionSource for Placeholder {
  fn label(&self) -> &'static str {
    "placeholder"
  }

  async fn complete(&self, _input: CompletionInput) -> Result<String, ChatError> {
    Ok(PLACEHOLDER_ANSWER.to_string())
  }
}

/// Searches the web for the latest message, renders the instruction
/// templates around the results and lets the model answer with the
/// selected tools.
pub struct Agent {
  search: Arc<dyn WebSearch>,
  model: AnthropicClient,
  templates: PromptTemplates,
}

impl Agent {
  pub fn new(search: Arc<dyn WebSearch>, model: AnthropicClient, templates: PromptTemplates) -> Self {
    Self {
      search,
      model,
      templates,
    }
  }
}

#[async_trait::async_trait]
impl CompletionSource for Agent {
  fn label(&self) -> &'static str {
    "agent"
  }

  async fn complete(&self, input: CompletionInput) -> Result<String, ChatError> {
    let hits = self.search.search(&input.latest_message).await?;
    tracing::info!(hits = hits.len(), "search results ready");

    let prompt = self.templates.render(&PromptVars {
      latest_message: &input.latest_message,
      argument: &input.argument,
      search_results: &hits,
    });
    tracing::debug!(model = %self.model.model(), tools = ?input.tools.names(), "calling model");
    self.model.complete(&prompt.system, &prompt.human, &input.tools).await
  }
}
