use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::ChatError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
  pub title: String,
  pub link: String,
  #[serde(default)]
  pub snippet: String,
}

#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ChatError>;
}

/// Google Custom Search JSON API. Without both credentials every query
/// returns no hits.
pub struct GoogleSearch {
  client: reqwest::Client,
  config: SearchConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
  #[serde(default)]
  items: Vec<SearchHit>,
}

impl GoogleSearch {
  pub fn new(client: reqwest::Client, config: SearchConfig) -> Self {
    Self { client, config }
  }
}

#[async_trait::async_trait]
impl WebSearch for GoogleSearch {
  async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ChatError> {
    let (Some(key), Some(cx)) = (self.config.api_key.as_deref(), self.config.engine_id.as_deref()) else {
      return Ok(Vec::new());
    };

    let resp = self
      .client
      .get(&self.config.base_url)
      .query(&[
        ("key", key),
        ("cx", cx),
        ("q", query),
        ("hl", self.config.language.as_str()),
        ("gl", self.config.country.as_str()),
        ("safe", "off"),
      ])
      .send()
      .await?;

    if !resp.status().is_success() {
      let status = resp.status();
      let text = resp.text().await.unwrap_or_else(|_| "search request failed".to_string());
      return Err(ChatError::Upstream(format!("search error ({status}): {text}")));
    }

    let body = resp.json::<SearchResponse>().await?;
    tracing::debug!(hits = body.items.len(), "web search finished");
    Ok(body.items)
  }
}
