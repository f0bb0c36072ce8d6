use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::backend::{StyleBackend, StyleRequest};
use crate::delay::{DelayRef, TokioDelay};
use crate::error::{classify_backend_failure, StyleError, StyleErrorCode};

pub const DEFAULT_REPLICATE_API_BASE: &str = "https://api.replicate.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_IMAGE_INPUT_KEY: &str = "image";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub image_input_key: String,
    pub poll_interval: Duration,
    pub max_polls: usize,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base: DEFAULT_REPLICATE_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            image_input_key: DEFAULT_IMAGE_INPUT_KEY.to_string(),
            poll_interval: POLL_INTERVAL,
            max_polls: MAX_POLLS,
        }
    }
}

/// Replicate predictions API, using synchronous `Prefer: wait` requests and
/// polling when the prediction outlives the wait window.
pub struct ReplicateBackend {
    client: Client,
    api_token: String,
    api_base: String,
    image_input_key: String,
    poll_interval: Duration,
    max_polls: usize,
    delay: DelayRef,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl ReplicateBackend {
    pub fn new(config: ReplicateConfig) -> Result<Self, StyleError> {
        let api_token = config
            .api_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                StyleError::new(
                    StyleErrorCode::CredentialMissing,
                    "no Replicate API token configured (set [style] api_token)",
                )
            })?;
        let api_base = config.api_base.trim_end_matches('/').to_string();
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("mapposter/", env!("CARGO_PKG_VERSION")));
        if is_loopback_base_url(&api_base) {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|error| {
            StyleError::new(
                StyleErrorCode::Network,
                format!("build http client failed: {error}"),
            )
        })?;
        Ok(Self {
            client,
            api_token,
            api_base,
            image_input_key: config.image_input_key,
            poll_interval: config.poll_interval,
            max_polls: config.max_polls,
            delay: std::sync::Arc::new(TokioDelay),
        })
    }

    /// Waits between status polls go through `delay`.
    pub fn delay(mut self, delay: DelayRef) -> Self {
        self.delay = delay;
        self
    }

    /// Input properties the model accepts, from its published OpenAPI schema.
    pub async fn describe_model_inputs(&self, model: &str) -> Result<Value, StyleError> {
        let (name, version) = split_model_ref(model);
        let url = match version {
            Some(version) => format!("{}/v1/models/{name}/versions/{version}", self.api_base),
            None => format!("{}/v1/models/{name}", self.api_base),
        };
        let body = self.send_json(self.authorized(self.client.get(url))).await?;
        let schema = match version {
            Some(_) => body.get("openapi_schema"),
            None => body
                .get("latest_version")
                .and_then(|latest| latest.get("openapi_schema")),
        };
        schema
            .and_then(|schema| schema.pointer("/components/schemas/Input/properties"))
            .cloned()
            .ok_or_else(|| {
                StyleError::new(
                    StyleErrorCode::ExtractionFailure,
                    format!("model {model} does not publish an input schema"),
                )
            })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }

    async fn build_input(&self, request: &StyleRequest) -> Result<Value, StyleError> {
        let mut input = Map::new();
        input.insert("prompt".to_string(), Value::String(request.prompt.clone()));
        if let Some(image) = &request.image {
            input.insert(
                self.image_input_key.clone(),
                Value::String(encode_image_data_uri(image).await?),
            );
        }
        Ok(Value::Object(input))
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, StyleError> {
        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let text = response.text().await.map_err(network_error)?;
        if !status.is_success() {
            return Err(rejection(status, &text));
        }
        serde_json::from_str(&text).map_err(|error| {
            StyleError::new(
                StyleErrorCode::Backend,
                format!("invalid JSON from backend: {error}"),
            )
        })
    }

    async fn settle(&self, mut prediction: Prediction) -> Result<Value, StyleError> {
        let mut polls = 0;
        loop {
            match prediction.status.as_str() {
                "succeeded" => return Ok(prediction.output.unwrap_or(Value::Null)),
                "failed" | "canceled" => {
                    let message = prediction
                        .error
                        .as_ref()
                        .map(error_text)
                        .unwrap_or_else(|| format!("prediction {}", prediction.status));
                    return Err(StyleError::new(classify_backend_failure(None, &message), message)
                        .with_details(json!({ "prediction": prediction.id })));
                }
                _ => {}
            }
            if polls >= self.max_polls {
                return Err(StyleError::new(
                    StyleErrorCode::Backend,
                    format!(
                        "prediction {} still {} after {polls} polls",
                        prediction.id, prediction.status
                    ),
                ));
            }
            let Some(get_url) = prediction.urls.as_ref().and_then(|urls| urls.get.clone()) else {
                return Err(StyleError::new(
                    StyleErrorCode::Backend,
                    format!("prediction {} has no status url", prediction.id),
                ));
            };
            polls += 1;
            self.delay.sleep(self.poll_interval).await;
            tracing::debug!(prediction = %prediction.id, polls, "polling prediction");
            let body = self.send_json(self.authorized(self.client.get(get_url))).await?;
            prediction = parse_prediction(body)?;
        }
    }
}

#[async_trait]
impl StyleBackend for ReplicateBackend {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn run(&self, request: &StyleRequest) -> Result<Value, StyleError> {
        let input = self.build_input(request).await?;
        let (name, version) = split_model_ref(&request.model);
        let (url, body) = match version {
            Some(version) => (
                format!("{}/v1/predictions", self.api_base),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/v1/models/{name}/predictions", self.api_base),
                json!({ "input": input }),
            ),
        };
        tracing::info!(model = %request.model, mode = %request.mode(), "submitting prediction");
        let builder = self
            .authorized(self.client.post(url))
            .header("Prefer", "wait")
            .json(&body);
        let prediction = parse_prediction(self.send_json(builder).await?)?;
        self.settle(prediction).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StyleError> {
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StyleError::new(
                StyleErrorCode::Backend,
                format!("download of {url} failed with {status}: {text}"),
            ));
        }
        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

fn parse_prediction(body: Value) -> Result<Prediction, StyleError> {
    serde_json::from_value(body).map_err(|error| {
        StyleError::new(
            StyleErrorCode::Backend,
            format!("unexpected prediction payload: {error}"),
        )
    })
}

/// `owner/name:version` -> (`owner/name`, Some(`version`)).
fn split_model_ref(model: &str) -> (&str, Option<&str>) {
    match model.split_once(':') {
        Some((name, version)) if !version.is_empty() => (name, Some(version)),
        Some((name, _)) => (name, None),
        None => (model, None),
    }
}

async fn encode_image_data_uri(path: &Path) -> Result<String, StyleError> {
    let bytes = tokio::fs::read(path).await.map_err(|error| {
        StyleError::new(
            StyleErrorCode::Io,
            format!("failed to read {}: {error}", path.display()),
        )
    })?;
    let mime = match path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

fn rejection(status: StatusCode, body: &str) -> StyleError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("title"))
                .map(error_text)
        })
        .unwrap_or_else(|| body.trim().to_string());
    let code = classify_backend_failure(Some(status.as_u16()), &message);
    StyleError::new(code, format!("backend returned {status}: {message}"))
        .with_details(json!({ "status": status.as_u16() }))
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn network_error(error: reqwest::Error) -> StyleError {
    StyleError::new(StyleErrorCode::Network, format!("request failed: {error}"))
}

fn is_loopback_base_url(base_url: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(base_url) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1"
}
