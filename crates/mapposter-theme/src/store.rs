use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::theme::{validate_theme_id, Theme, ThemeFile};

pub const HIDDEN_THEMES_FILE_NAME: &str = "hidden_themes.json";
const HIDDEN_THEMES_BACKUP_SUFFIX: &str = "bak";
const THEME_FILE_EXTENSION: &str = "json";

/// Errors that can occur in theme store operations.
#[derive(Debug, Error)]
pub enum ThemeStoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("theme file {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid theme id: {0}")]
    InvalidThemeId(String),
}

impl ThemeStoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Local theme directory: one `<id>.json` per theme plus the hidden-themes tombstone list.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    themes_dir: PathBuf,
}

impl ThemeStore {
    pub fn new(themes_dir: impl Into<PathBuf>) -> Self {
        Self {
            themes_dir: themes_dir.into(),
        }
    }

    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }

    pub fn theme_path(&self, id: &str) -> PathBuf {
        self.themes_dir.join(format!("{id}.{THEME_FILE_EXTENSION}"))
    }

    pub fn hidden_themes_path(&self) -> PathBuf {
        self.themes_dir.join(HIDDEN_THEMES_FILE_NAME)
    }

    /// Ids with a theme file, minus hidden ids, sorted.
    pub fn list_available(&self) -> Vec<String> {
        let hidden = self.hidden_themes().into_iter().collect::<BTreeSet<_>>();
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.themes_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !path.is_file()
                || path.extension().map_or(true, |ext| ext != THEME_FILE_EXTENSION)
                || path.file_name().is_some_and(|name| name == HIDDEN_THEMES_FILE_NAME)
            {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_theme_id(id).is_err() || hidden.contains(id) {
                continue;
            }
            ids.push(id.to_string());
        }
        ids.sort();
        ids
    }

    /// Read a stored theme. `Ok(None)` when no file exists; partial files are
    /// completed from defaults.
    pub fn read(&self, id: &str) -> Result<Option<Theme>, ThemeStoreError> {
        validate_theme_id(id).map_err(ThemeStoreError::InvalidThemeId)?;
        let path = self.theme_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(ThemeStoreError::io(&path, error)),
        };
        let file = serde_json::from_str::<ThemeFile>(&content)
            .map_err(|source| ThemeStoreError::Parse {
                path: path.clone(),
                source,
            })?;
        let (theme, missing) = Theme::from_file(file);
        if !missing.is_empty() {
            tracing::warn!(
                theme_id = id,
                missing = ?missing,
                "theme file is partial; filled missing roles from defaults"
            );
        }
        Ok(Some(theme))
    }

    /// Load a theme for rendering. Never fails: anything unreadable degrades to the default theme.
    pub fn load(&self, id: &str) -> Theme {
        match self.read(id) {
            Ok(Some(theme)) => theme,
            Ok(None) => Theme::default(),
            Err(error) => {
                tracing::warn!(theme_id = id, %error, "falling back to default theme");
                Theme::default()
            }
        }
    }

    /// Write the full record, replacing any existing file.
    pub fn save(&self, theme: &Theme, id: &str) -> Result<PathBuf, ThemeStoreError> {
        validate_theme_id(id).map_err(ThemeStoreError::InvalidThemeId)?;
        fs::create_dir_all(&self.themes_dir)
            .map_err(|error| ThemeStoreError::io(&self.themes_dir, error))?;
        let path = self.theme_path(id);
        let content = theme
            .to_json_pretty()
            .map_err(|source| ThemeStoreError::Parse {
                path: path.clone(),
                source,
            })?;
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Hide `id` permanently, then remove its file.
    ///
    /// The tombstone is written before the file is touched, so an interrupted
    /// delete still keeps the id out of listings. Returns `Ok(true)` when either
    /// step succeeded; an error is returned only when both failed.
    pub fn delete(&self, id: &str) -> Result<bool, ThemeStoreError> {
        validate_theme_id(id).map_err(ThemeStoreError::InvalidThemeId)?;

        let hidden_result = self.hide(id);
        if let Err(error) = &hidden_result {
            tracing::warn!(theme_id = id, %error, "failed to record hidden theme");
        }

        let path = self.theme_path(id);
        let removal_result = match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ThemeStoreError::io(&path, error)),
        };

        match (hidden_result, removal_result) {
            (Ok(()), Ok(_)) => Ok(true),
            (Ok(()), Err(error)) => {
                tracing::warn!(theme_id = id, %error, "theme hidden but local file remains");
                Ok(true)
            }
            (Err(_), Ok(true)) => Ok(true),
            (Err(error), Ok(false)) | (Err(error), Err(_)) => Err(error),
        }
    }

    /// Tombstoned ids in insertion order. Missing or corrupt files read as empty.
    pub fn hidden_themes(&self) -> Vec<String> {
        match self.read_hidden_list() {
            HiddenList::Parsed(ids) => ids,
            HiddenList::Missing | HiddenList::Corrupt(_) => Vec::new(),
        }
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.hidden_themes().iter().any(|hidden| hidden == id)
    }

    fn read_hidden_list(&self) -> HiddenList {
        let path = self.hidden_themes_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return HiddenList::Missing,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "unreadable hidden themes list");
                return HiddenList::Corrupt(None);
            }
        };
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(ids) => HiddenList::Parsed(ids),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "corrupt hidden themes list ignored"
                );
                HiddenList::Corrupt(Some(content))
            }
        }
    }

    fn hide(&self, id: &str) -> Result<(), ThemeStoreError> {
        let path = self.hidden_themes_path();
        let mut hidden = match self.read_hidden_list() {
            HiddenList::Parsed(ids) => ids,
            HiddenList::Missing => Vec::new(),
            HiddenList::Corrupt(content) => {
                // Keep the unreadable list around before it gets replaced.
                let backup = path.with_extension(format!("json.{HIDDEN_THEMES_BACKUP_SUFFIX}"));
                fs::copy(&path, &backup).map_err(|error| ThemeStoreError::io(&backup, error))?;
                let salvaged = content.as_deref().map(salvage_hidden_ids).unwrap_or_default();
                tracing::warn!(
                    backup = %backup.display(),
                    salvaged = salvaged.len(),
                    "kept corrupt hidden themes list"
                );
                salvaged
            }
        };
        if hidden.iter().any(|existing| existing == id) {
            return Ok(());
        }
        hidden.push(id.to_string());
        fs::create_dir_all(&self.themes_dir)
            .map_err(|error| ThemeStoreError::io(&self.themes_dir, error))?;
        let content = serde_json::to_string_pretty(&hidden).map_err(|source| {
            ThemeStoreError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        write_atomic(&path, content.as_bytes())
    }
}

enum HiddenList {
    Missing,
    Corrupt(Option<String>),
    Parsed(Vec<String>),
}

/// Complete entries of a truncated `["a", "b", "c` list; the cut-off tail is dropped.
fn salvage_hidden_ids(content: &str) -> Vec<String> {
    let Some(body) = content.trim().strip_prefix('[') else {
        return Vec::new();
    };
    let body = body.trim_end().trim_end_matches(']');
    let mut ids = Vec::new();
    for entry in body.split(',') {
        let Ok(id) = serde_json::from_str::<String>(entry.trim()) else {
            continue;
        };
        if validate_theme_id(&id).is_ok() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Write through a sibling temp file and rename it over `path`, so readers
/// see either the old content or the new one.
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), ThemeStoreError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&temp_path, content).map_err(|error| ThemeStoreError::io(&temp_path, error))?;
    fs::rename(&temp_path, path).map_err(|error| {
        let _ = fs::remove_file(&temp_path);
        ThemeStoreError::io(path, error)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::RoleKey;
    use tempfile::tempdir;

    #[test]
    fn list_available_ignores_hidden_list_and_foreign_files() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        store.save(&Theme::default(), "zeta").expect("save zeta");
        store.save(&Theme::default(), "alpha").expect("save alpha");
        fs::write(dir.path().join("notes.txt"), "x").expect("write foreign file");
        fs::write(dir.path().join(HIDDEN_THEMES_FILE_NAME), "[]").expect("write hidden");

        assert_eq!(store.list_available(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn list_available_is_empty_for_missing_directory() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path().join("absent"));
        assert!(store.list_available().is_empty());
    }

    #[test]
    fn load_degrades_to_defaults_for_missing_and_corrupt_files() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        assert_eq!(store.load("missing"), Theme::default());

        fs::write(store.theme_path("broken"), "{not json").expect("write corrupt");
        assert!(matches!(
            store.read("broken"),
            Err(ThemeStoreError::Parse { .. })
        ));
        assert_eq!(store.load("broken"), Theme::default());
    }

    #[test]
    fn corrupt_hidden_list_reads_as_empty() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        fs::write(store.hidden_themes_path(), "oops").expect("write corrupt hidden list");
        assert!(store.hidden_themes().is_empty());

        assert!(store.delete("noir").expect("delete"));
        assert_eq!(store.hidden_themes(), vec!["noir"]);
        let backup = dir.path().join("hidden_themes.json.bak");
        assert_eq!(fs::read_to_string(backup).expect("read backup"), "oops");
    }

    #[test]
    fn truncated_hidden_list_keeps_complete_entries() {
        assert_eq!(
            salvage_hidden_ids("[\n  \"noir\",\n  \"sun"),
            vec!["noir".to_string()]
        );
        assert_eq!(
            salvage_hidden_ids("[\"a\", \"b\", "),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(salvage_hidden_ids("oops").is_empty());
    }

    #[test]
    fn hidden_list_file_name_matches_reserved_id() {
        assert_eq!(
            HIDDEN_THEMES_FILE_NAME,
            format!("{}.{THEME_FILE_EXTENSION}", crate::theme::RESERVED_THEME_ID)
        );
    }

    #[test]
    fn writes_leave_no_temp_files_behind() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        store.save(&Theme::default(), "noir").expect("save noir");
        store.delete("ocean").expect("delete ocean");

        let mut names = fs::read_dir(dir.path())
            .expect("read themes dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["hidden_themes.json", "noir.json"]);
    }

    #[test]
    fn delete_keeps_hidden_list_ordered_and_unique() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        store.delete("b").expect("delete b");
        store.delete("a").expect("delete a");
        store.delete("b").expect("delete b again");
        assert_eq!(store.hidden_themes(), vec!["b", "a"]);
        assert!(store.is_hidden("a"));
    }

    #[test]
    fn save_rejects_unsafe_ids() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        let error = store
            .save(&Theme::default(), "../escape")
            .expect_err("unsafe id should fail");
        assert!(matches!(error, ThemeStoreError::InvalidThemeId(_)));
    }

    #[test]
    fn save_overwrites_existing_record() {
        let dir = tempdir().expect("temp dir");
        let store = ThemeStore::new(dir.path());
        let mut theme = Theme::default();
        store.save(&theme, "ocean").expect("first save");
        theme.set_color(RoleKey::Water, "#0000FF".parse().expect("hex"));
        store.save(&theme, "ocean").expect("second save");
        assert_eq!(store.load("ocean"), theme);
    }
}
