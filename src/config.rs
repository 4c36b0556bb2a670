use std::path::Path;
use std::time::Duration;

use crate::error::ChatError;
use crate::prompt::PromptTemplates;

const DEFAULT_MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

/// Process-wide settings, read once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub vector_store: VectorStoreConfig,
  pub anthropic: AnthropicConfig,
  /// `selectedModel` value that routes to the canned placeholder answer.
  pub placeholder_model: String,
  pub search: SearchConfig,
  pub coingecko_base_url: String,
  pub wikipedia_base_url: String,
  pub stream_delay_ms: (u64, u64),
  /// `None` leaves upstream calls unbounded.
  pub upstream_timeout: Option<Duration>,
  /// Largest `/api/chat` body accepted, base64 uploads included.
  pub max_request_bytes: usize,
  pub templates: PromptTemplates,
}

/// The vector store is only validated at startup; no request path queries it.
#[derive(Clone, Debug)]
pub struct VectorStoreConfig {
  pub url: String,
  pub private_key: String,
}

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
  pub api_key: Option<String>,
  pub engine_id: Option<String>,
  pub base_url: String,
  pub language: String,
  pub country: String,
}

impl SearchConfig {
  pub fn enabled(&self) -> bool {
    self.api_key.is_some() && self.engine_id.is_some()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ChatError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds the config from an arbitrary key lookup. Empty values count as absent.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let require = |key: &str| get(key).ok_or_else(|| ChatError::MissingConfiguration(format!("expected env var {key}")));

    let supabase_url = require("SUPABASE_URL")?;
    let supabase_key = require("SUPABASE_PRIVATE_KEY")?;
    let anthropic_key = require("ANTHROPIC_API_KEY")?;

    let anthropic_base_url = get("ANTHROPIC_BASE_URL").unwrap_or_else(|| "https://api.anthropic.com".to_string());
    for (key, url) in [("SUPABASE_URL", &supabase_url), ("ANTHROPIC_BASE_URL", &anthropic_base_url)] {
      if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ChatError::InvalidConfiguration(format!("{key} must start with http:// or https://")));
      }
    }

    let max_tokens: u32 = parse_number(&get, "ANTHROPIC_MAX_TOKENS", 1024)?;
    let delay_min: u64 = parse_number(&get, "STREAM_DELAY_MIN_MS", 10)?;
    let delay_max: u64 = parse_number(&get, "STREAM_DELAY_MAX_MS", 29)?;
    if delay_min > delay_max {
      return Err(ChatError::InvalidConfiguration(format!(
        "STREAM_DELAY_MIN_MS ({delay_min}) exceeds STREAM_DELAY_MAX_MS ({delay_max})"
      )));
    }
    let timeout_secs: u64 = parse_number(&get, "UPSTREAM_TIMEOUT_SECS", 60)?;
    let max_request_bytes: usize = parse_number(&get, "MAX_REQUEST_BYTES", DEFAULT_MAX_REQUEST_BYTES)?;
    if max_request_bytes == 0 {
      return Err(ChatError::InvalidConfiguration("MAX_REQUEST_BYTES must be positive".to_string()));
    }

    let templates = PromptTemplates {
      system: match get("PROMPT_SYSTEM_TEMPLATE") {
        Some(path) => read_template(Path::new(&path))?,
        None => PromptTemplates::default().system,
      },
      human: match get("PROMPT_HUMAN_TEMPLATE") {
        Some(path) => read_template(Path::new(&path))?,
        None => PromptTemplates::default().human,
      },
    };

    Ok(Self {
      vector_store: VectorStoreConfig {
        url: supabase_url,
        private_key: supabase_key,
      },
      anthropic: AnthropicConfig {
        api_key: anthropic_key,
        base_url: anthropic_base_url.trim_end_matches('/').to_string(),
        model: get("ANTHROPIC_MODEL").unwrap_or_else(|| "claude-3-haiku-20240307".to_string()),
        max_tokens,
      },
      placeholder_model: get("PLACEHOLDER_MODEL").unwrap_or_else(|| "claude-instant-1".to_string()),
      search: SearchConfig {
        api_key: get("GOOGLE_SEARCH_API_KEY"),
        engine_id: get("GOOGLE_SEARCH_ENGINE_ID"),
        base_url: get("GOOGLE_SEARCH_BASE_URL")
          .unwrap_or_else(|| "https://www.googleapis.com/customsearch/v1".to_string()),
        language: get("SEARCH_LANGUAGE").unwrap_or_else(|| "pt".to_string()),
        country: get("SEARCH_COUNTRY").unwrap_or_else(|| "br".to_string()),
      },
      coingecko_base_url: get("COINGECKO_BASE_URL")
        .unwrap_or_else(|| "https://api.coingecko.com/api/v3".to_string())
        .trim_end_matches('/')
        .to_string(),
      wikipedia_base_url: get("WIKIPEDIA_BASE_URL")
        .unwrap_or_else(|| "https://en.wikipedia.org".to_string())
        .trim_end_matches('/')
        .to_string(),
      stream_delay_ms: (delay_min, delay_max),
      upstream_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
      max_request_bytes,
      templates,
    })
  }

  /// Shared HTTP client for the model, search and tool calls.
  pub fn http_client(&self) -> Result<reqwest::Client, ChatError> {
    let mut builder = reqwest::Client::builder().user_agent(concat!("luzia/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = self.upstream_timeout {
      builder = builder.timeout(timeout);
    }
    builder
      .build()
      .map_err(|err| ChatError::InvalidConfiguration(err.to_string()))
  }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T, ChatError>
where
  T: std::str::FromStr,
  G: Fn(&str) -> Option<String>,
{
  match get(key) {
    Some(raw) => raw
      .parse()
      .map_err(|_| ChatError::InvalidConfiguration(format!("{key} is not a valid number: {raw}"))),
    None => Ok(default),
  }
}

fn read_template(path: &Path) -> Result<String, ChatError> {
  std::fs::read_to_string(path)
    .map_err(|err| ChatError::InvalidConfiguration(format!("cannot read template {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn required() -> HashMap<&'static str, &'static str> {
    HashMap::from([
      ("SUPABASE_URL", "https://db.example.supabase.co"),
      ("SUPABASE_PRIVATE_KEY", "service-role-key"),
      ("ANTHROPIC_API_KEY", "sk-ant-test"),
    ])
  }

  fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ChatError> {
    AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
  }

  #[test]
  fn defaults_apply_when_only_required_vars_are_set() {
    let config = load(&required()).expect("required vars are enough");
    assert_eq!(config.placeholder_model, "claude-instant-1");
    assert_eq!(config.anthropic.base_url, "https://api.anthropic.com");
    assert_eq!(config.stream_delay_ms, (10, 29));
    assert_eq!(config.upstream_timeout, Some(Duration::from_secs(60)));
    assert_eq!(config.max_request_bytes, 32 * 1024 * 1024);
    assert!(!config.search.enabled());
    assert!(config.templates.system.contains("{{search_results}}"));
  }

  #[test]
  fn each_missing_credential_is_fatal() {
    for key in ["SUPABASE_URL", "SUPABASE_PRIVATE_KEY", "ANTHROPIC_API_KEY"] {
      let mut vars = required();
      vars.remove(key);
      match load(&vars) {
        Err(ChatError::MissingConfiguration(msg)) => assert!(msg.contains(key), "{msg}"),
        other => panic!("expected MissingConfiguration for {key}, got {other:?}"),
      }
    }
  }

  #[test]
  fn blank_credential_counts_as_missing() {
    let mut vars = required();
    vars.insert("ANTHROPIC_API_KEY", "   ");
    assert!(matches!(load(&vars), Err(ChatError::MissingConfiguration(_))));
  }

  #[test]
  fn inverted_delay_range_is_rejected() {
    let mut vars = required();
    vars.insert("STREAM_DELAY_MIN_MS", "50");
    vars.insert("STREAM_DELAY_MAX_MS", "5");
    assert!(matches!(load(&vars), Err(ChatError::InvalidConfiguration(_))));
  }

  #[test]
  fn zero_timeout_disables_the_bound() {
    let mut vars = required();
    vars.insert("UPSTREAM_TIMEOUT_SECS", "0");
    assert_eq!(load(&vars).unwrap().upstream_timeout, None);
  }

  #[test]
  fn request_size_limit_is_configurable() {
    let mut vars = required();
    vars.insert("MAX_REQUEST_BYTES", "4096");
    assert_eq!(load(&vars).unwrap().max_request_bytes, 4096);

    vars.insert("MAX_REQUEST_BYTES", "0");
    assert!(matches!(load(&vars), Err(ChatError::InvalidConfiguration(_))));
  }

  #[test]
  fn non_http_urls_are_rejected() {
    let mut vars = required();
    vars.insert("SUPABASE_URL", "db.example.supabase.co");
    assert!(matches!(load(&vars), Err(ChatError::InvalidConfiguration(_))));
  }

  #[test]
  fn search_is_enabled_with_both_credentials() {
    let mut vars = required();
    vars.insert("GOOGLE_SEARCH_API_KEY", "key");
    vars.insert("GOOGLE_SEARCH_ENGINE_ID", "cx");
    assert!(load(&vars).unwrap().search.enabled());
  }
}
