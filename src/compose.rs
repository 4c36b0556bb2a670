use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::ChatError;
use crate::models::{DecodedFile, FileUpload};

// Browsers are not consistent about padding on uploads.
const UPLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn decode_files(files: &[FileUpload]) -> Result<Vec<DecodedFile>, ChatError> {
  files
    .iter()
    .enumerate()
    .map(|(idx, file)| {
      let compact: String = file.base64.chars().filter(|c| !c.is_ascii_whitespace()).collect();
      let bytes = UPLOAD_ENGINE
        .decode(compact.as_bytes())
        .map_err(|err| ChatError::Decode(format!("file {idx}: {err}")))?;
      Ok(DecodedFile {
        content: String::from_utf8_lossy(&bytes).into_owned(),
      })
    })
    .collect()
}

/// Builds the single prompt argument: the question alone, or the question
/// preceded by the text of every uploaded file.
pub fn prompt_argument(latest_message: &str, files: &[DecodedFile]) -> String {
  if files.is_empty() {
    return latest_message.to_string();
  }
  let knowledge = files
    .iter()
    .map(|f| f.content.as_str())
    .collect::<Vec<_>>()
    .join("\n");
  format!(
    "--- Antes de utilizar conhecimentos do treino, use as informações extraidas de um arquivo, a seguir: {knowledge} --- PERGUNTA DO HUMANO: {latest_message} "
  )
}
