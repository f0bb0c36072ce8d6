use std::path::{Path, PathBuf};

use base64::Engine;
use serde_json::Value;

use crate::backend::StyleBackend;
use crate::error::{StyleError, StyleErrorCode};

/// A reference to generated bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputHandle {
    /// Bytes carried in the response itself (`data:` URI).
    Inline(Vec<u8>),
    /// Bytes that still have to be downloaded.
    Remote(String),
}

/// The shapes a backend may return for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    SingleHandle(OutputHandle),
    HandleList(Vec<OutputHandle>),
    UrlString(String),
}

impl BackendOutput {
    /// The handle to persist; lists contribute their first entry.
    pub fn into_primary(self) -> Result<OutputHandle, StyleError> {
        match self {
            BackendOutput::SingleHandle(handle) => Ok(handle),
            BackendOutput::HandleList(handles) => handles
                .into_iter()
                .next()
                .ok_or_else(|| extraction_failure("backend returned an empty output list")),
            BackendOutput::UrlString(url) => Ok(OutputHandle::Remote(url)),
        }
    }
}

pub fn classify_output(value: &Value) -> Result<BackendOutput, StyleError> {
    match value {
        Value::String(text) if is_data_uri(text) => {
            Ok(BackendOutput::SingleHandle(decode_data_uri(text)?))
        }
        Value::String(text) if is_http_url(text) => Ok(BackendOutput::UrlString(text.clone())),
        Value::Object(_) => Ok(BackendOutput::SingleHandle(handle_from_value(value)?)),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(extraction_failure("backend returned an empty output list"));
            }
            let handles = items
                .iter()
                .map(handle_from_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BackendOutput::HandleList(handles))
        }
        other => Err(extraction_failure(format!(
            "unrecognized backend output shape: {}",
            shape_name(other)
        ))),
    }
}

fn handle_from_value(value: &Value) -> Result<OutputHandle, StyleError> {
    match value {
        Value::String(text) if is_data_uri(text) => decode_data_uri(text),
        Value::String(text) if is_http_url(text) => Ok(OutputHandle::Remote(text.clone())),
        Value::Object(map) => match map.get("url").and_then(Value::as_str) {
            Some(url) if is_data_uri(url) => decode_data_uri(url),
            Some(url) if is_http_url(url) => Ok(OutputHandle::Remote(url.to_string())),
            _ => Err(extraction_failure("output object has no usable url")),
        },
        other => Err(extraction_failure(format!(
            "output entry is not a file handle: {}",
            shape_name(other)
        ))),
    }
}

fn is_data_uri(text: &str) -> bool {
    text.starts_with("data:")
}

fn is_http_url(text: &str) -> bool {
    text.starts_with("https://") || text.starts_with("http://")
}

fn decode_data_uri(text: &str) -> Result<OutputHandle, StyleError> {
    let Some((header, payload)) = text.split_once(',') else {
        return Err(extraction_failure("data URI has no payload"));
    };
    if !header.ends_with(";base64") {
        return Err(extraction_failure("data URI is not base64 encoded"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map(OutputHandle::Inline)
        .map_err(|error| {
            extraction_failure(format!("data URI payload is not valid base64: {error}"))
        })
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn extraction_failure(message: impl Into<String>) -> StyleError {
    StyleError::new(StyleErrorCode::ExtractionFailure, message)
}

/// `poster.png` + `_styled` -> `poster_styled.png`, next to the input.
pub fn styled_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = match input.extension() {
        Some(extension) => format!("{stem}{suffix}.{}", extension.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(file_name)
}

/// Resolve a handle to bytes and write them to `output_path`.
pub async fn persist_output(
    backend: &dyn StyleBackend,
    handle: OutputHandle,
    output_path: &Path,
) -> Result<u64, StyleError> {
    let bytes = match handle {
        OutputHandle::Inline(bytes) => bytes,
        OutputHandle::Remote(url) => backend.fetch(&url).await?,
    };
    if bytes.is_empty() {
        return Err(extraction_failure("backend produced an empty artifact"));
    }
    tokio::fs::write(output_path, &bytes).await.map_err(|error| {
        StyleError::new(
            StyleErrorCode::Io,
            format!("failed to write {}: {error}", output_path.display()),
        )
    })?;
    Ok(bytes.len() as u64)
}
