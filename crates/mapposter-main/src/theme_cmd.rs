use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use mapposter_theme::{
    theme_id_from_input, validate_theme_id, EditingSession, GitHubContentApi, RemoteCredentials,
    RemoteThemeSync, RoleKey, Theme, ThemePersistence, ThemeStore,
};

use crate::config::AppConfig;

#[derive(Args, Debug, Clone)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub command: ThemeCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommand {
    /// List stored themes, hidden ones excluded.
    List,
    /// Print one theme's colors.
    Show { id: String },
    Save(ThemeSaveArgs),
    /// Delete a theme remotely and hide it locally for good.
    Delete {
        id: String,
        #[arg(long, default_value_t = false)]
        local_only: bool,
    },
}

/// Create or update a theme, remote first with local fallback.
#[derive(Args, Debug, Clone)]
pub struct ThemeSaveArgs {
    /// Theme id; spaces become underscores.
    pub id: String,
    /// Start from a stored theme instead of the default one.
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long = "set", value_name = "ROLE=#RRGGBB")]
    pub set: Vec<String>,
    #[arg(long = "oklch", value_name = "ROLE=L,C,H")]
    pub oklch: Vec<String>,
    /// Pasted palette block, `-` for stdin.
    #[arg(long)]
    pub palette: Option<PathBuf>,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value_t = false)]
    pub local_only: bool,
}

pub async fn run_theme_command(command: ThemeCommand, config: &AppConfig) -> Result<(), String> {
    let store = ThemeStore::new(&config.themes_dir);
    match command {
        ThemeCommand::List => {
            let ids = store.list_available();
            if ids.is_empty() {
                println!("no themes in {}", store.themes_dir().display());
            }
            for id in ids {
                println!("{id}");
            }
            Ok(())
        }
        ThemeCommand::Show { id } => show_theme(&store, &id),
        ThemeCommand::Save(args) => save_theme(store, args, config).await,
        ThemeCommand::Delete { id, local_only } => {
            delete_theme(store, &id, local_only, config).await
        }
    }
}

fn show_theme(store: &ThemeStore, id: &str) -> Result<(), String> {
    let theme = store
        .read(id)
        .map_err(|error| error.to_string())?
        .ok_or_else(|| format!("theme '{id}' not found in {}", store.themes_dir().display()))?;
    if store.is_hidden(id) {
        println!("(hidden: deleted themes stay out of the list)");
    }
    print_theme(&theme);
    Ok(())
}

fn print_theme(theme: &Theme) {
    println!("{}", theme.name);
    println!("{}", theme.description);
    for (role, color) in theme.colors() {
        println!("  {:<18} {:<18} {}", role.label(), role.as_str(), color);
    }
}

async fn save_theme(
    store: ThemeStore,
    args: ThemeSaveArgs,
    config: &AppConfig,
) -> Result<(), String> {
    let id = theme_id_from_input(&args.id);
    validate_theme_id(&id)?;

    let mut session = match args.from.as_deref() {
        Some(source) => EditingSession::open(&store, source),
        None => EditingSession::from_scratch(),
    };
    for assignment in &args.set {
        let (role, value) = parse_assignment(assignment)?;
        session
            .apply_hex(role, value)
            .map_err(|error| format!("--set {assignment}: {error}"))?;
    }
    for assignment in &args.oklch {
        let (role, value) = parse_assignment(assignment)?;
        let color = session
            .apply_oklch(role, value)
            .map_err(|error| format!("--oklch {assignment}: {error}"))?;
        println!("{role}: {color}");
    }
    if let Some(path) = &args.palette {
        let text = read_text_input(path)?;
        let applied = session.apply_palette(&text).map_err(|error| error.to_string())?;
        println!("applied {applied} palette colors");
    }

    if let Some(name) = args.name.as_deref() {
        session.rename(name);
    }

    let persistence = build_persistence(store, config, args.local_only)?;
    let outcome = persistence
        .save_session(&mut session, &id, args.description.as_deref())
        .await;
    println!("{}", outcome.message());
    if outcome.is_persisted() {
        Ok(())
    } else {
        Err(format!("theme '{id}' was not saved"))
    }
}

async fn delete_theme(
    store: ThemeStore,
    id: &str,
    local_only: bool,
    config: &AppConfig,
) -> Result<(), String> {
    validate_theme_id(id)?;
    let mut session = EditingSession::open(&store, id);
    let persistence = build_persistence(store, config, local_only)?;
    let report = persistence
        .delete_source(&mut session)
        .await
        .ok_or_else(|| "nothing to delete".to_string())?;
    println!("{}", report.message());
    if report.is_deleted() {
        Ok(())
    } else {
        Err(format!("theme '{id}' was not deleted"))
    }
}

fn build_persistence(
    store: ThemeStore,
    config: &AppConfig,
    local_only: bool,
) -> Result<ThemePersistence<GitHubContentApi>, String> {
    if local_only {
        return Ok(ThemePersistence::new(store, None));
    }
    let remote = &config.remote;
    let api = GitHubContentApi::new(
        remote.api_base.clone(),
        remote.repo.clone(),
        remote.branch.clone(),
        remote.request_timeout,
    )?;
    let sync = RemoteThemeSync::new(api, RemoteCredentials::new(remote.token.clone()))
        .path_prefix(remote.path_prefix.clone());
    Ok(ThemePersistence::new(store, Some(sync)))
}

/// `water=#A8C4C4` -> (Water, "#A8C4C4").
fn parse_assignment(raw: &str) -> Result<(RoleKey, &str), String> {
    let (role, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=VALUE, got '{raw}'"))?;
    Ok((role.parse::<RoleKey>()?, value.trim()))
}

pub(crate) fn read_text_input(path: &Path) -> Result<String, String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|error| format!("read stdin failed: {error}"))?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .map_err(|error| format!("read {} failed: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assignment_splits_role_and_value() {
        let (role, value) = parse_assignment("road_motorway= #ff0000").expect("valid assignment");
        assert_eq!(role, RoleKey::RoadMotorway);
        assert_eq!(value, "#ff0000");
    }

    #[test]
    fn parse_assignment_rejects_unknown_role_and_missing_equals() {
        assert!(parse_assignment("sky=#ffffff").is_err());
        assert!(parse_assignment("water").is_err());
    }
}
