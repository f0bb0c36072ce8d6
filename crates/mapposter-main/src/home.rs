use std::ffi::OsString;
use std::path::{Path, PathBuf};

const DEFAULT_HOME_DIR_NAME: &str = ".mapposter";
const HOME_ENV_VAR: &str = "MAPPOSTER_HOME";
const CONFIG_FILE_NAME: &str = "mapposter.toml";
const THEMES_DIR_NAME: &str = "themes";
const LOGS_DIR_NAME: &str = "logs";

/// The mapposter home directory and the layout under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapposterHome {
    root: PathBuf,
}

impl MapposterHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `--conf-dir` wins, then `MAPPOSTER_HOME`, then `~/.mapposter`.
    pub fn resolve(conf_dir: Option<&Path>) -> Self {
        Self::resolve_with(conf_dir, std::env::var_os(HOME_ENV_VAR))
    }

    fn resolve_with(conf_dir: Option<&Path>, env_home: Option<OsString>) -> Self {
        let explicit = conf_dir
            .map(Path::to_path_buf)
            .or_else(|| env_home.filter(|value| !value.is_empty()).map(PathBuf::from));
        match explicit {
            Some(path) => Self::new(anchor_at_current_dir(expand_user_home(&path))),
            None => Self::new(user_home_dir().join(DEFAULT_HOME_DIR_NAME)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn default_themes_dir(&self) -> PathBuf {
        self.root.join(THEMES_DIR_NAME)
    }

    pub fn default_logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR_NAME)
    }

    /// A configured path: `~` expands to the user's home, relative paths sit under this home.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let expanded = expand_user_home(Path::new(raw));
        if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        }
    }
}

fn anchor_at_current_dir(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

fn expand_user_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" {
        return user_home_dir();
    }
    if let Some(suffix) = raw.strip_prefix("~/") {
        return user_home_dir().join(suffix);
    }
    path.to_path_buf()
}

fn user_home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home);
    }
    if let Some(profile) = std::env::var_os("USERPROFILE") {
        return PathBuf::from(profile);
    }
    PathBuf::from(".")
}
