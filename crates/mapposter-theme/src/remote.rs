//! Remote copy of theme records in a version-controlled content store.
//!
//! Writes use optimistic concurrency: the current version token is fetched
//! first and sent back with the update. A stale token is reported as a
//! conflict and never retried here; falling back to local persistence is the
//! caller's job.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::theme::{validate_theme_id, Theme};

pub const DEFAULT_REMOTE_REPO: &str = "pxdogbo/mapposter";
pub const DEFAULT_REMOTE_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_REMOTE_PATH_PREFIX: &str = "themes";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote token not configured")]
    CredentialMissing,
    #[error("network error: {0}")]
    Network(String),
    #[error("version conflict: {0}")]
    Conflict(String),
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid theme id: {0}")]
    InvalidThemeId(String),
    #[error("could not encode theme: {0}")]
    Encode(String),
}

/// Opaque version of a remote resource (a content hash for GitHub).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDeleteOutcome {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    pub kind: WriteKind,
    pub path: String,
}

impl PushReceipt {
    pub fn message(&self) -> String {
        match self.kind {
            WriteKind::Created => format!("Created remote theme ({})", self.path),
            WriteKind::Updated => format!("Updated remote theme ({})", self.path),
        }
    }
}

/// Content API consumed by the sync: get a version, put with optional version, delete by version.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn fetch_version(
        &self,
        token: &str,
        path: &str,
    ) -> Result<Option<VersionToken>, RemoteError>;

    async fn put(
        &self,
        token: &str,
        path: &str,
        request: PutRequest<'_>,
    ) -> Result<(), RemoteError>;

    async fn delete(
        &self,
        token: &str,
        path: &str,
        commit_message: &str,
        version: &VersionToken,
    ) -> Result<RemoteDeleteOutcome, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct PutRequest<'a> {
    pub commit_message: &'a str,
    pub content: &'a [u8],
    pub version: Option<&'a VersionToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub token: Option<String>,
}

impl RemoteCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

pub struct RemoteThemeSync<A> {
    api: A,
    credentials: RemoteCredentials,
    path_prefix: String,
}

impl<A: ContentApi> RemoteThemeSync<A> {
    pub fn new(api: A, credentials: RemoteCredentials) -> Self {
        Self {
            api,
            credentials,
            path_prefix: DEFAULT_REMOTE_PATH_PREFIX.to_string(),
        }
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    pub fn resource_path(&self, id: &str) -> String {
        if self.path_prefix.is_empty() {
            format!("{id}.json")
        } else {
            format!("{}/{id}.json", self.path_prefix)
        }
    }

    /// Create or update the remote record for `id`.
    pub async fn push(&self, theme: &Theme, id: &str) -> Result<PushReceipt, RemoteError> {
        let token = self.token()?;
        validate_theme_id(id).map_err(RemoteError::InvalidThemeId)?;
        let path = self.resource_path(id);
        let content = theme
            .to_json_pretty()
            .map_err(|error| RemoteError::Encode(error.to_string()))?;

        let version = self.api.fetch_version(token, &path).await?;
        let kind = if version.is_some() {
            WriteKind::Updated
        } else {
            WriteKind::Created
        };
        let commit_message = format!("Add/update theme: {id}");
        self.api
            .put(
                token,
                &path,
                PutRequest {
                    commit_message: &commit_message,
                    content: content.as_bytes(),
                    version: version.as_ref(),
                },
            )
            .await?;
        tracing::info!(theme_id = id, path = %path, kind = ?kind, "pushed theme to remote");
        Ok(PushReceipt { kind, path })
    }

    /// Delete the remote record for `id`. A missing record is `NotFound`, not an error.
    pub async fn delete(&self, id: &str) -> Result<RemoteDeleteOutcome, RemoteError> {
        let token = self.token()?;
        validate_theme_id(id).map_err(RemoteError::InvalidThemeId)?;
        let path = self.resource_path(id);

        let Some(version) = self.api.fetch_version(token, &path).await? else {
            tracing::info!(theme_id = id, path = %path, "remote theme not found");
            return Ok(RemoteDeleteOutcome::NotFound);
        };
        let commit_message = format!("Delete theme: {id}");
        let outcome = self
            .api
            .delete(token, &path, &commit_message, &version)
            .await?;
        match outcome {
            RemoteDeleteOutcome::Deleted => {
                tracing::info!(theme_id = id, path = %path, "deleted theme from remote")
            }
            RemoteDeleteOutcome::NotFound => {
                tracing::info!(theme_id = id, path = %path, "remote theme already gone")
            }
        }
        Ok(outcome)
    }

    fn token(&self) -> Result<&str, RemoteError> {
        self.credentials
            .token
            .as_deref()
            .ok_or(RemoteError::CredentialMissing)
    }
}

/// GitHub repository contents API.
#[derive(Debug, Clone)]
pub struct GitHubContentApi {
    client: Client,
    api_base: String,
    repo: String,
    branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteContentBody<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

impl GitHubContentApi {
    pub fn new(
        api_base: impl Into<String>,
        repo: impl Into<String>,
        branch: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, String> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let mut builder = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("mapposter/", env!("CARGO_PKG_VERSION")));
        if is_loopback_base_url(&api_base) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|error| format!("build remote client failed: {error}"))?;
        Ok(Self {
            client,
            api_base,
            repo: repo.into(),
            branch: branch.filter(|value| !value.trim().is_empty()),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{path}", self.api_base, self.repo)
    }

    fn request(&self, method: reqwest::Method, token: &str, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.contents_url(path))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }
}

#[async_trait]
impl ContentApi for GitHubContentApi {
    async fn fetch_version(
        &self,
        token: &str,
        path: &str,
    ) -> Result<Option<VersionToken>, RemoteError> {
        let mut request = self.request(reqwest::Method::GET, token, path);
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }
        let response = request
            .send()
            .await
            .map_err(|error| RemoteError::Network(format!("fetch {path} failed: {error}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(rejection(status, response).await);
        }
        let parsed = response
            .json::<ContentResponse>()
            .await
            .map_err(|error| RemoteError::Network(format!("decode {path} failed: {error}")))?;
        Ok(parsed.sha.filter(|sha| !sha.is_empty()).map(VersionToken))
    }

    async fn put(
        &self,
        token: &str,
        path: &str,
        request: PutRequest<'_>,
    ) -> Result<(), RemoteError> {
        let body = PutContentBody {
            message: request.commit_message,
            content: base64::engine::general_purpose::STANDARD.encode(request.content),
            sha: request.version.map(|version| version.0.as_str()),
            branch: self.branch.as_deref(),
        };
        let response = self
            .request(reqwest::Method::PUT, token, path)
            .json(&body)
            .send()
            .await
            .map_err(|error| RemoteError::Network(format!("write {path} failed: {error}")))?;
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }
        Err(rejection(status, response).await)
    }

    async fn delete(
        &self,
        token: &str,
        path: &str,
        commit_message: &str,
        version: &VersionToken,
    ) -> Result<RemoteDeleteOutcome, RemoteError> {
        let body = DeleteContentBody {
            message: commit_message,
            sha: &version.0,
            branch: self.branch.as_deref(),
        };
        let response = self
            .request(reqwest::Method::DELETE, token, path)
            .json(&body)
            .send()
            .await
            .map_err(|error| RemoteError::Network(format!("delete {path} failed: {error}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(RemoteDeleteOutcome::NotFound);
        }
        if status.is_success() {
            return Ok(RemoteDeleteOutcome::Deleted);
        }
        Err(rejection(status, response).await)
    }
}

async fn rejection(status: StatusCode, response: reqwest::Response) -> RemoteError {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubErrorResponse>(&text)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or(text);
    classify_rejection(status.as_u16(), message)
}

fn classify_rejection(status: u16, message: String) -> RemoteError {
    // GitHub answers 409 for a stale sha and 422 when a required sha is missing.
    let sha_related = message.to_ascii_lowercase().contains("sha");
    if status == 409 || (status == 422 && sha_related) {
        RemoteError::Conflict(message)
    } else {
        RemoteError::Rejected { status, message }
    }
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
