use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Every way a chat request, or the process serving it, can fail.
#[derive(Debug, Error)]
pub enum ChatError {
  #[error("missing configuration: {0}")]
  MissingConfiguration(String),

  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),

  #[error("malformed request: {0}")]
  MalformedRequest(String),

  #[error("request body too large: {0}")]
  PayloadTooLarge(String),

  #[error("could not decode file: {0}")]
  Decode(String),

  #[error("unknown function: {0}")]
  UnknownTool(String),

  #[error("upstream request failed: {0}")]
  Upstream(String),

  #[error("upstream request timed out: {0}")]
  UpstreamTimeout(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ChatError {
  pub fn status(&self) -> StatusCode {
    match self {
      ChatError::MalformedRequest(_) | ChatError::Decode(_) | ChatError::UnknownTool(_) => {
        StatusCode::BAD_REQUEST
      }
      ChatError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
      ChatError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
      ChatError::MissingConfiguration(_)
      | ChatError::InvalidConfiguration(_)
      | ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ChatError::MissingConfiguration(_) => "missing_configuration",
      ChatError::InvalidConfiguration(_) => "invalid_configuration",
      ChatError::MalformedRequest(_) => "malformed_request",
      ChatError::PayloadTooLarge(_) => "payload_too_large",
      ChatError::Decode(_) => "decode_error",
      ChatError::UnknownTool(_) => "unknown_tool",
      ChatError::Upstream(_) => "upstream_failure",
      ChatError::UpstreamTimeout(_) => "upstream_timeout",
      ChatError::Internal(_) => "internal_error",
    }
  }
}

impl From<reqwest::Error> for ChatError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ChatError::UpstreamTimeout(err.to_string())
    } else {
      ChatError::Upstream(err.to_string())
    }
  }
}

impl From<BytesRejection> for ChatError {
  fn from(rejection: BytesRejection) -> Self {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
      ChatError::PayloadTooLarge(rejection.body_text())
    } else {
      ChatError::MalformedRequest(rejection.body_text())
    }
  }
}

impl IntoResponse for ChatError {
  fn into_response(self) -> Response {
    let body = Json(serde_json::json!({ "error": self.to_string(), "code": self.code() }));
    (self.status(), body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_faults_map_to_bad_request() {
    assert_eq!(ChatError::MalformedRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ChatError::Decode("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ChatError::UnknownTool("x".into()).status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn oversized_body_maps_to_payload_too_large() {
    let err = ChatError::PayloadTooLarge("x".into());
    assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err.code(), "payload_too_large");
  }

  #[test]
  fn upstream_faults_map_to_gateway_errors() {
    assert_eq!(ChatError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(ChatError::UpstreamTimeout("x".into()).status(), StatusCode::GATEWAY_TIMEOUT);
  }

  #[tokio::test]
  async fn error_body_carries_message_and_code() {
    let resp = ChatError::UnknownTool("teleport".into()).into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["code"], "unknown_tool");
    assert_eq!(value["error"], "unknown function: teleport");
  }
}
