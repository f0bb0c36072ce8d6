use std::path::PathBuf;

use crate::color::{ColorError, HexColor};
use crate::palette::{parse_palette_block, parse_single_color, PaletteError};
use crate::remote::{ContentApi, PushReceipt, RemoteDeleteOutcome, RemoteError, RemoteThemeSync};
use crate::store::{ThemeStore, ThemeStoreError};
use crate::theme::{display_name, RoleKey, Theme};

/// Where the theme being edited came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    Scratch,
    Stored(String),
}

/// Editing context owned by the front end and passed explicitly to every action.
#[derive(Debug, Clone)]
pub struct EditingSession {
    source: ThemeSource,
    theme: Theme,
    name_override: Option<String>,
    dirty: bool,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::from_scratch()
    }
}

impl EditingSession {
    pub fn from_scratch() -> Self {
        Self {
            source: ThemeSource::Scratch,
            theme: Theme::default(),
            name_override: None,
            dirty: false,
        }
    }

    pub fn open(store: &ThemeStore, id: &str) -> Self {
        Self {
            source: ThemeSource::Stored(id.to_string()),
            theme: store.load(id),
            name_override: None,
            dirty: false,
        }
    }

    pub fn source(&self) -> &ThemeSource {
        &self.source
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Name to save under instead of the one derived from the id. Blank clears it.
    pub fn rename(&mut self, name: &str) {
        let name = name.trim();
        self.name_override = (!name.is_empty()).then(|| name.to_string());
        self.dirty = true;
    }

    pub fn set_color(&mut self, role: RoleKey, color: HexColor) {
        self.theme.set_color(role, color);
        self.dirty = true;
    }

    pub fn apply_hex(&mut self, role: RoleKey, text: &str) -> Result<HexColor, ColorError> {
        let color = text.parse::<HexColor>()?;
        self.set_color(role, color.clone());
        Ok(color)
    }

    pub fn apply_oklch(&mut self, role: RoleKey, text: &str) -> Result<HexColor, ColorError> {
        let color = parse_single_color(text)?.to_hex();
        self.set_color(role, color.clone());
        Ok(color)
    }

    /// Apply every recognised line of a pasted palette; returns how many roles changed.
    pub fn apply_palette(&mut self, text: &str) -> Result<usize, PaletteError> {
        let assignments = parse_palette_block(text)?;
        let applied = self.theme.apply(&assignments);
        self.dirty = true;
        Ok(applied)
    }

    /// Full record ready for persistence under `id`.
    pub fn build_full_theme(&self, id: &str, description: Option<&str>) -> Theme {
        let description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Saved from editor - {id}"));
        let mut theme = self.theme.clone();
        theme.name = self
            .name_override
            .clone()
            .unwrap_or_else(|| display_name(id));
        theme.description = description;
        theme
    }

    pub fn mark_saved(&mut self, id: &str) {
        self.source = ThemeSource::Stored(id.to_string());
        self.dirty = false;
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Remote write succeeded; the local copy result is reported alongside.
    Synced {
        receipt: PushReceipt,
        local: Result<PathBuf, ThemeStoreError>,
    },
    /// Remote write failed or is disabled; the theme lives only locally.
    LocalOnly {
        path: PathBuf,
        remote_error: RemoteError,
    },
    Failed {
        remote_error: RemoteError,
        local_error: ThemeStoreError,
    },
}

impl SaveOutcome {
    pub fn is_persisted(&self) -> bool {
        !matches!(self, SaveOutcome::Failed { .. })
    }

    pub fn message(&self) -> String {
        match self {
            SaveOutcome::Synced {
                receipt,
                local: Ok(path),
            } => format!("{} and local copy {}", receipt.message(), path.display()),
            SaveOutcome::Synced {
                receipt,
                local: Err(error),
            } => format!("{} (local copy not written: {error})", receipt.message()),
            SaveOutcome::LocalOnly { path, remote_error } => {
                format!("Saved locally to {} ({remote_error})", path.display())
            }
            SaveOutcome::Failed {
                remote_error,
                local_error,
            } => format!("Save failed: {local_error}. {remote_error}"),
        }
    }
}

#[derive(Debug)]
pub struct DeleteReport {
    pub remote: Result<RemoteDeleteOutcome, RemoteError>,
    pub local: Result<bool, ThemeStoreError>,
}

impl DeleteReport {
    pub fn is_deleted(&self) -> bool {
        matches!(self.local, Ok(true))
    }

    pub fn message(&self) -> String {
        let remote = match &self.remote {
            Ok(RemoteDeleteOutcome::Deleted) => "removed from remote".to_string(),
            Ok(RemoteDeleteOutcome::NotFound) => "not found on remote".to_string(),
            Err(error) => format!("remote delete skipped: {error}"),
        };
        match &self.local {
            Ok(true) => format!("Theme hidden locally; {remote}"),
            Ok(false) => format!("Theme not deleted locally; {remote}"),
            Err(error) => format!("Local delete failed: {error}; {remote}"),
        }
    }
}

/// Remote-first persistence with local fallback.
pub struct ThemePersistence<A> {
    store: ThemeStore,
    remote: Option<RemoteThemeSync<A>>,
}

impl<A: ContentApi> ThemePersistence<A> {
    pub fn new(store: ThemeStore, remote: Option<RemoteThemeSync<A>>) -> Self {
        Self { store, remote }
    }

    pub fn store(&self) -> &ThemeStore {
        &self.store
    }

    pub async fn save(&self, theme: &Theme, id: &str) -> SaveOutcome {
        let remote_result = match &self.remote {
            Some(remote) => remote.push(theme, id).await,
            None => Err(RemoteError::CredentialMissing),
        };

        match remote_result {
            Ok(receipt) => {
                let local = self.store.save(theme, id);
                if let Err(error) = &local {
                    tracing::warn!(
                        theme_id = id,
                        %error,
                        "remote save succeeded but local write failed"
                    );
                }
                SaveOutcome::Synced { receipt, local }
            }
            Err(remote_error) => {
                tracing::warn!(
                    theme_id = id,
                    error = %remote_error,
                    "remote save failed; saving locally"
                );
                match self.store.save(theme, id) {
                    Ok(path) => SaveOutcome::LocalOnly { path, remote_error },
                    Err(local_error) => SaveOutcome::Failed {
                        remote_error,
                        local_error,
                    },
                }
            }
        }
    }

    /// Save the session's theme under `id` and make `id` its new source on success.
    pub async fn save_session(
        &self,
        session: &mut EditingSession,
        id: &str,
        description: Option<&str>,
    ) -> SaveOutcome {
        let theme = session.build_full_theme(id, description);
        let outcome = self.save(&theme, id).await;
        if outcome.is_persisted() {
            session.mark_saved(id);
        }
        outcome
    }

    /// Remote delete first, then the local tombstone and file removal, which always run.
    pub async fn delete(&self, id: &str) -> DeleteReport {
        let remote = match &self.remote {
            Some(remote) => remote.delete(id).await,
            None => Err(RemoteError::CredentialMissing),
        };
        if let Err(error) = &remote {
            tracing::warn!(theme_id = id, %error, "remote delete failed; continuing locally");
        }
        let local = self.store.delete(id);
        DeleteReport { remote, local }
    }

    /// Delete the theme the session was opened from. Scratch sessions have
    /// nothing to delete and return `None`; otherwise the session falls back
    /// to scratch once the theme is gone.
    pub async fn delete_source(&self, session: &mut EditingSession) -> Option<DeleteReport> {
        let ThemeSource::Stored(id) = session.source().clone() else {
            tracing::info!("refusing to delete the scratch theme");
            return None;
        };
        let report = self.delete(&id).await;
        if report.is_deleted() {
            *session = EditingSession::from_scratch();
        }
        Some(report)
    }
}
