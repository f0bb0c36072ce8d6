use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StyleError;

/// Default image-to-image model used for poster styling.
pub const DEFAULT_STYLE_MODEL: &str = "pxdogbo/dream.district:snedjsxd2xrmr0cwb3hag5kkxw";
pub const DEFAULT_STYLE_PROMPT: &str =
    "minimalist map poster, city street network, artistic design, high quality";
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_styled";

/// How the input image is presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Image attached alongside the prompt.
    ImageAndPrompt,
    /// Prompt only; used when the backend refuses image input.
    PromptOnly,
}

impl Display for InputMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::ImageAndPrompt => f.write_str("image+prompt"),
            InputMode::PromptOnly => f.write_str("prompt-only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<PathBuf>,
}

impl StyleRequest {
    pub fn mode(&self) -> InputMode {
        if self.image.is_some() {
            InputMode::ImageAndPrompt
        } else {
            InputMode::PromptOnly
        }
    }
}

/// A remote image-generation service.
#[async_trait]
pub trait StyleBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run one prediction and return the raw backend output.
    async fn run(&self, request: &StyleRequest) -> Result<Value, StyleError>;

    /// Download a generated artifact by URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StyleError>;
}

pub type StyleBackendRef = Arc<dyn StyleBackend>;
