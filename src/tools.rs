use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::error::ChatError;
use crate::models::FunctionToggle;

const WIKIPEDIA_MAX_CHARS: usize = 300;

/// A capability the model may call while answering.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
  fn name(&self) -> &'static str;
  fn description(&self) -> &'static str;
  /// JSON Schema of the `input` object passed to [`Tool::invoke`].
  fn input_schema(&self) -> Value;
  async fn invoke(&self, input: Value) -> Result<String, ChatError>;
}

/// Every tool the service knows, built once at startup.
pub struct ToolCatalog {
  tools: Vec<Arc<dyn Tool>>,
}

/// The tools enabled for one request, in the order the caller toggled them.
#[derive(Clone, Default)]
pub struct ToolSelection {
  tools: Vec<Arc<dyn Tool>>,
}

impl ToolCatalog {
  pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
    Self { tools }
  }

  pub fn standard(config: &AppConfig, client: reqwest::Client) -> Self {
    Self::new(vec![
      Arc::new(Foo),
      Arc::new(FetchCryptoPrice {
        client: client.clone(),
        base_url: config.coingecko_base_url.clone(),
      }),
      Arc::new(Wikipedia {
        client,
        base_url: config.wikipedia_base_url.clone(),
      }),
    ])
  }

  pub fn names(&self) -> Vec<&'static str> {
    self.tools.iter().map(|t| t.name()).collect()
  }

  fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
    self.tools.iter().find(|t| t.name() == name)
  }

  /// Picks the active toggles. An active toggle naming no catalog entry is
  /// an error; inactive unknown names are ignored.
  pub fn select(&self, toggles: &[FunctionToggle]) -> Result<ToolSelection, ChatError> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
    for toggle in toggles.iter().filter(|t| t.active) {
      let tool = self
        .get(&toggle.name)
        .ok_or_else(|| ChatError::UnknownTool(toggle.name.clone()))?;
      if !tools.iter().any(|t| t.name() == tool.name()) {
        tools.push(tool.clone());
      }
    }
    Ok(ToolSelection { tools })
  }
}

impl ToolSelection {
  pub fn len(&self) -> usize {
    self.tools.len()
  }

  pub fn names(&self) -> Vec<&'static str> {
    self.tools.iter().map(|t| t.name()).collect()
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
    self.tools.iter().find(|t| t.name() == name)
  }

  /// Tool definitions in the Anthropic Messages API shape.
  pub fn definitions(&self) -> Vec<Value> {
    self
      .tools
      .iter()
      .map(|t| {
        json!({
          "name": t.name(),
          "description": t.description(),
          "input_schema": t.input_schema(),
        })
      })
      .collect()
  }
}

pub struct Foo;

#[async_trait::async_trait]
impl Tool for Foo {
  fn name(&self) -> &'static str {
    "foo"
  }

  fn description(&self) -> &'static str {
    "Returns the value of foo"
  }

  fn input_schema(&self) -> Value {
    json!({ "type": "object", "properties": {} })
  }

  async fn invoke(&self, _input: Value) -> Result<String, ChatError> {
    Ok(r#"The value of foo is "this is a langchain, next.js, supabase, claude, openai and AI demo""#.to_string())
  }
}

pub struct FetchCryptoPrice {
  client: reqwest::Client,
  base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CryptoPriceInput {
  crypto_name: String,
  #[serde(default = "default_vs_currency")]
  vs_currency: String,
}

fn default_vs_currency() -> String {
  "USD".to_string()
}

#[async_trait::async_trait]
impl Tool for FetchCryptoPrice {
  fn name(&self) -> &'static str {
    "fetchCryptoPrice"
  }

  fn description(&self) -> &'static str {
    "Fetches the current price of a specified cryptocurrency"
  }

  fn input_schema(&self) -> Value {
    json!({
      "type": "object",
      "properties": {
        "cryptoName": { "type": "string", "description": "CoinGecko id, e.g. bitcoin" },
        "vsCurrency": { "type": "string", "default": "USD" }
      },
      "required": ["cryptoName"]
    })
  }

  async fn invoke(&self, input: Value) -> Result<String, ChatError> {
    let input: CryptoPriceInput =
      serde_json::from_value(input).map_err(|err| ChatError::MalformedRequest(err.to_string()))?;
    let id = input.crypto_name.to_lowercase();
    let vs = input.vs_currency.to_lowercase();

    let resp = self
      .client
      .get(format!("{}/simple/price", self.base_url))
      .query(&[("ids", id.as_str()), ("vs_currencies", vs.as_str())])
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(ChatError::Upstream(format!("coingecko error ({})", resp.status())));
    }

    let data = resp.json::<Value>().await?;
    match &data[&id][&vs] {
      Value::Null => Err(ChatError::Upstream(format!("no {vs} price for {id}"))),
      price => Ok(price.to_string()),
    }
  }
}

pub struct Wikipedia {
  client: reqwest::Client,
  base_url: String,
}

#[derive(Deserialize)]
struct WikipediaInput {
  query: String,
}

#[async_trait::async_trait]
impl Tool for Wikipedia {
  fn name(&self) -> &'static str {
    "wikipedia"
  }

  fn description(&self) -> &'static str {
    "Looks up a topic on Wikipedia and returns the start of the best matching article"
  }

  fn input_schema(&self) -> Value {
    json!({
      "type": "object",
      "properties": { "query": { "type": "string" } },
      "required": ["query"]
    })
  }

  async fn invoke(&self, input: Value) -> Result<String, ChatError> {
    let input: WikipediaInput =
      serde_json::from_value(input).map_err(|err| ChatError::MalformedRequest(err.to_string()))?;

    let resp = self
      .client
      .get(format!("{}/w/api.php", self.base_url))
      .query(&[
        ("action", "query"),
        ("format", "json"),
        ("formatversion", "2"),
        ("generator", "search"),
        ("gsrsearch", input.query.as_str()),
        ("gsrlimit", "1"),
        ("prop", "extracts"),
        ("exintro", "1"),
        ("explaintext", "1"),
      ])
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(ChatError::Upstream(format!("wikipedia error ({})", resp.status())));
    }

    let data = resp.json::<Value>().await?;
    let page = &data["query"]["pages"][0];
    let Some(title) = page["title"].as_str() else {
      return Ok("No good Wikipedia search result was found".to_string());
    };
    let extract: String = page["extract"].as_str().unwrap_or("").chars().take(WIKIPEDIA_MAX_CHARS).collect();
    Ok(format!("Page: {title}\nSummary: {extract}"))
  }
}
