use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ChatError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
  #[serde(default)]
  pub role: String,
  pub content: String,
}

/// A toggle for one entry of the tool catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FunctionToggle {
  pub name: String,
  pub active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
  pub base64: String,
}

/// An upload whose payload has been decoded to text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFile {
  pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
  pub messages: Vec<Message>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub functions: Vec<FunctionToggle>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub files: Vec<FileUpload>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub selected_model: String,
  #[serde(default)]
  pub selected_vector_storage: Option<String>,
}

impl ChatRequest {
  pub fn from_json(body: &[u8]) -> Result<Self, ChatError> {
    serde_json::from_slice(body).map_err(|err| ChatError::MalformedRequest(err.to_string()))
  }

  /// The message being answered.
  pub fn latest_message(&self) -> Result<&Message, ChatError> {
    self
      .messages
      .last()
      .ok_or_else(|| ChatError::MalformedRequest("messages must not be empty".to_string()))
  }
}

/// Browsers send `null` for unset fields; treat it like an absent one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
