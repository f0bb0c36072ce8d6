use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use mapposter_style::{
    BackendSettings, StylePacing, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_OUTPUT_SUFFIX,
    DEFAULT_STYLE_MODEL, DEFAULT_STYLE_PROMPT, DEFAULT_WARM_UP,
};
use mapposter_theme::{DEFAULT_REMOTE_API_BASE, DEFAULT_REMOTE_PATH_PREFIX, DEFAULT_REMOTE_REPO};
use serde::Deserialize;

use crate::home::MapposterHome;

const DEFAULT_REMOTE_TOKEN: &str = "$GITHUB_TOKEN";
const DEFAULT_STYLE_TOKEN: &str = "$REPLICATE_API_TOKEN";
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_STYLE_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_STYLE_API_BASE: &str = "https://api.replicate.com";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub home: MapposterHome,
    pub themes_dir: PathBuf,
    pub remote: RemoteConfig,
    pub style: StyleConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub token: Option<String>,
    pub repo: String,
    pub branch: Option<String>,
    pub path_prefix: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub api_token: Option<String>,
    pub model: String,
    pub prompt: String,
    pub output_suffix: String,
    pub pacing: StylePacing,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl StyleConfig {
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            api_token: self.api_token.clone(),
            api_base: Some(self.api_base.clone()),
            request_timeout: Some(self.request_timeout),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub stderr: bool,
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
struct MapposterTomlFile {
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    themes: MapposterTomlThemes,
    #[serde(default)]
    remote: MapposterTomlRemote,
    #[serde(default)]
    style: MapposterTomlStyle,
    #[serde(default)]
    log: MapposterTomlLog,
}

#[derive(Debug, Deserialize, Default)]
struct MapposterTomlThemes {
    #[serde(default)]
    dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MapposterTomlRemote {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    path_prefix: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MapposterTomlStyle {
    #[serde(default)]
    api_token: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    output_suffix: Option<String>,
    #[serde(default)]
    warm_up_secs: Option<u64>,
    #[serde(default)]
    backoff_secs: Option<u64>,
    #[serde(default)]
    max_attempts: Option<usize>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MapposterTomlLog {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    stderr: Option<bool>,
    #[serde(default)]
    path: Option<String>,
}

/// Load `mapposter.toml` from the home directory; a missing file means defaults.
pub fn load_app_config(home: &MapposterHome) -> Result<AppConfig, String> {
    let path = home.config_path();
    let content = if path.exists() {
        std::fs::read_to_string(&path)
            .map_err(|error| format!("read {} failed: {error}", path.display()))?
    } else {
        String::new()
    };
    parse_app_config(&content, home)
}

pub fn parse_app_config(content: &str, home: &MapposterHome) -> Result<AppConfig, String> {
    let parsed: MapposterTomlFile = toml::from_str(content).map_err(|error| {
        format!("parse {} failed: {error}", home.config_path().display())
    })?;
    let env = &parsed.env;

    let themes_dir = resolve_dir(parsed.themes.dir.as_deref(), env, home)
        .unwrap_or_else(|| home.default_themes_dir());

    let remote = RemoteConfig {
        token: resolve_config_value(
            parsed.remote.token.as_deref().unwrap_or(DEFAULT_REMOTE_TOKEN),
            env,
        ),
        repo: resolve_or(parsed.remote.repo.as_deref(), env, DEFAULT_REMOTE_REPO),
        branch: parsed
            .remote
            .branch
            .as_deref()
            .and_then(|value| resolve_config_value(value, env)),
        path_prefix: resolve_or(
            parsed.remote.path_prefix.as_deref(),
            env,
            DEFAULT_REMOTE_PATH_PREFIX,
        ),
        api_base: resolve_or(parsed.remote.api_base.as_deref(), env, DEFAULT_REMOTE_API_BASE),
        request_timeout: Duration::from_millis(
            parsed
                .remote
                .request_timeout_ms
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
        ),
    };
    if !remote.repo.contains('/') {
        return Err(format!(
            "remote.repo must look like owner/name, got '{}'",
            remote.repo
        ));
    }

    let output_suffix = match parsed.style.output_suffix.as_deref() {
        Some(raw) => raw.trim().to_string(),
        None => DEFAULT_OUTPUT_SUFFIX.to_string(),
    };
    if output_suffix.is_empty() {
        return Err("style.output_suffix must not be empty".to_string());
    }
    let max_attempts = parsed.style.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err("style.max_attempts must be at least 1".to_string());
    }
    let style = StyleConfig {
        api_token: resolve_config_value(
            parsed.style.api_token.as_deref().unwrap_or(DEFAULT_STYLE_TOKEN),
            env,
        ),
        model: resolve_or(parsed.style.model.as_deref(), env, DEFAULT_STYLE_MODEL),
        prompt: resolve_or(parsed.style.prompt.as_deref(), env, DEFAULT_STYLE_PROMPT),
        output_suffix,
        pacing: StylePacing {
            warm_up: parsed
                .style
                .warm_up_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WARM_UP),
            backoff: parsed
                .style
                .backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_BACKOFF),
            max_attempts,
        },
        api_base: resolve_or(parsed.style.api_base.as_deref(), env, DEFAULT_STYLE_API_BASE),
        request_timeout: Duration::from_millis(
            parsed
                .style
                .request_timeout_ms
                .unwrap_or(DEFAULT_STYLE_TIMEOUT_MS),
        ),
    };

    let log = LogConfig {
        level: resolve_or(parsed.log.level.as_deref(), env, DEFAULT_LOG_LEVEL),
        stderr: parsed.log.stderr.unwrap_or(false),
        dir: resolve_dir(parsed.log.path.as_deref(), env, home)
            .unwrap_or_else(|| home.default_logs_dir()),
    };

    Ok(AppConfig {
        home: home.clone(),
        themes_dir,
        remote,
        style,
        log,
    })
}

fn resolve_or(value: Option<&str>, env_map: &HashMap<String, String>, default: &str) -> String {
    value
        .and_then(|value| resolve_config_value(value, env_map))
        .unwrap_or_else(|| default.to_string())
}

fn resolve_dir(
    value: Option<&str>,
    env_map: &HashMap<String, String>,
    home: &MapposterHome,
) -> Option<PathBuf> {
    let resolved = resolve_config_value(value?, env_map)?;
    Some(home.resolve_path(&resolved))
}

/// `$NAME` values come from `[env]` first, then the process environment.
fn resolve_config_value(value: &str, env_map: &HashMap<String, String>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(env_key) = trimmed.strip_prefix('$') {
        return env_map
            .get(env_key)
            .cloned()
            .or_else(|| std::env::var(env_key).ok())
            .map(|resolved| resolved.trim().to_string())
            .filter(|resolved| !resolved.is_empty());
    }
    Some(trimmed.to_string())
}
