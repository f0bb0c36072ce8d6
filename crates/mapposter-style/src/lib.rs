//! AI restyling of rendered posters through a rate-limited image-to-image
//! backend.

mod backend;
mod client;
mod delay;
mod error;
mod output;
#[cfg(feature = "replicate")]
mod replicate;

pub use backend::{
    InputMode, StyleBackend, StyleBackendRef, StyleRequest, DEFAULT_OUTPUT_SUFFIX,
    DEFAULT_STYLE_MODEL, DEFAULT_STYLE_PROMPT,
};
pub use client::{JobOutcome, JobState, StyleJob, StylingClient};
pub use delay::{
    Delay, DelayRef, StylePacing, TokioDelay, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_WARM_UP,
};
pub use error::{classify_backend_failure, StyleError, StyleErrorCode};
pub use output::{
    classify_output, persist_output, styled_output_path, BackendOutput, OutputHandle,
};
#[cfg(feature = "replicate")]
pub use replicate::{
    ReplicateBackend, ReplicateConfig, DEFAULT_IMAGE_INPUT_KEY, DEFAULT_REPLICATE_API_BASE,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Settings for whichever backend this build was compiled with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendSettings {
    pub api_token: Option<String>,
    pub api_base: Option<String>,
    pub request_timeout: Option<std::time::Duration>,
}

/// Build the compiled-in backend. `Ok(None)` means no backend is available.
#[cfg(feature = "replicate")]
pub fn build_backend(settings: &BackendSettings) -> Result<Option<StyleBackendRef>, StyleError> {
    let backend = ReplicateBackend::new(replicate_config(settings))?;
    Ok(Some(std::sync::Arc::new(backend)))
}

#[cfg(feature = "replicate")]
fn replicate_config(settings: &BackendSettings) -> ReplicateConfig {
    let mut config = ReplicateConfig {
        api_token: settings.api_token.clone(),
        ..ReplicateConfig::default()
    };
    if let Some(api_base) = &settings.api_base {
        config.api_base = api_base.clone();
    }
    if let Some(timeout) = settings.request_timeout {
        config.request_timeout = timeout;
    }
    config
}

#[cfg(not(feature = "replicate"))]
pub fn build_backend(_settings: &BackendSettings) -> Result<Option<StyleBackendRef>, StyleError> {
    Ok(None)
}

/// Input properties a model accepts, as published by the backend.
#[cfg(feature = "replicate")]
pub async fn describe_model_inputs(
    settings: &BackendSettings,
    model: &str,
) -> Result<serde_json::Value, StyleError> {
    ReplicateBackend::new(replicate_config(settings))?
        .describe_model_inputs(model)
        .await
}

#[cfg(not(feature = "replicate"))]
pub async fn describe_model_inputs(
    _settings: &BackendSettings,
    _model: &str,
) -> Result<serde_json::Value, StyleError> {
    Err(StyleError::new(
        StyleErrorCode::BackendUnavailable,
        "image styling backend is not available in this build",
    ))
}
