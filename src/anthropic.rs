use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AnthropicConfig;
use crate::error::ChatError;
use crate::tools::ToolSelection;

const API_VERSION: &str = "2023-06-01";
const MAX_TOOL_ROUNDS: usize = 5;

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
  client: reqwest::Client,
  config: AnthropicConfig,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  temperature: f32,
  system: &'a str,
  messages: &'a [Value],
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
  #[serde(default)]
  content: Vec<ContentBlock>,
  #[serde(default)]
  stop_reason: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
  Text {
    text: String,
  },
  ToolUse {
    id: String,
    name: String,
    #[serde(default)]
    input: Value,
  },
  #[serde(other)]
  Other,
}

impl AnthropicClient {
  pub fn new(client: reqwest::Client, config: AnthropicConfig) -> Self {
    Self { client, config }
  }

  pub fn model(&self) -> &str {
    &self.config.model
  }

  /// Runs one question to a final text answer, calling selected tools as
  /// the model asks for them.
  pub async fn complete(&self, system: &str, human: &str, tools: &ToolSelection) -> Result<String, ChatError> {
    let mut messages = vec![json!({ "role": "user", "content": human })];

    for round in 0..=MAX_TOOL_ROUNDS {
      let resp = self.send(system, &messages, tools).await?;
      if resp.stop_reason.as_deref() != Some("tool_use") {
        return Ok(collect_text(&resp.content));
      }
      if round == MAX_TOOL_ROUNDS {
        break;
      }

      let mut results = Vec::new();
      for block in &resp.content {
        if let ContentBlock::ToolUse { id, name, input } = block {
          let (content, is_error) = match tools.get(name) {
            Some(tool) => match tool.invoke(input.clone()).await {
              Ok(out) => (out, false),
              Err(err) => (err.to_string(), true),
            },
            None => (format!("tool {name} is not enabled"), true),
          };
          tracing::debug!(tool = %name, is_error, "tool invoked");
          results.push(json!({
            "type": "tool_result",
            "tool_use_id": id,
            "content": content,
            "is_error": is_error,
          }));
        }
      }

      let assistant_content: Vec<&ContentBlock> =
        resp.content.iter().filter(|b| !matches!(b, ContentBlock::Other)).collect();
      messages.push(json!({ "role": "assistant", "content": assistant_content }));
      messages.push(json!({ "role": "user", "content": results }));
    }

    Err(ChatError::Upstream(format!(
      "model still requesting tools after {MAX_TOOL_ROUNDS} rounds"
    )))
  }

  async fn send(&self, system: &str, messages: &[Value], tools: &ToolSelection) -> Result<MessagesResponse, ChatError> {
    let payload = MessagesRequest {
      model: &self.config.model,
      max_tokens: self.config.max_tokens,
      temperature: 0.0,
      system,
      messages,
      tools: tools.definitions(),
    };

    let resp = self
      .client
      .post(format!("{}/v1/messages", self.config.base_url))
      .header("x-api-key", &self.config.api_key)
      .header("anthropic-version", API_VERSION)
      .json(&payload)
      .send()
      .await?;

    if !resp.status().is_success() {
      let upstream_status = resp.status();
      let text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Anthropic request failed.".to_string());
      return Err(ChatError::Upstream(format!("Anthropic error ({upstream_status}): {text}")));
    }

    Ok(resp.json::<MessagesResponse>().await?)
  }
}

fn collect_text(blocks: &[ContentBlock]) -> String {
  blocks
    .iter()
    .filter_map(|b| match b {
      ContentBlock::Text { text } => Some(text.as_str()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("")
}
