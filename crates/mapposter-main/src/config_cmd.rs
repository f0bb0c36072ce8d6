use std::fs;
use std::path::Path;

use mapposter_theme::ThemeStore;

use crate::config::{load_app_config, parse_app_config, AppConfig};
use crate::home::MapposterHome;

const MAPPOSTER_TOML_SAMPLE: &str = include_str!("../../../mapposter.toml.sample");

/// Write the bundled sample config unless one exists, then create the
/// directories the effective config points at.
pub fn run_config_init(home: &MapposterHome) -> Result<(), String> {
    ensure_dir(home.root())?;

    let config_path = home.config_path();
    let config = if config_path.exists() {
        println!("kept: {}", config_path.display());
        load_app_config(home)?
    } else {
        fs::write(&config_path, MAPPOSTER_TOML_SAMPLE)
            .map_err(|error| format!("write {} failed: {error}", config_path.display()))?;
        println!("created: {}", config_path.display());
        parse_app_config(MAPPOSTER_TOML_SAMPLE, home)?
    };

    for dir in init_directories(&config) {
        ensure_dir(dir)?;
        println!("ready: {}", dir.display());
    }
    let available = ThemeStore::new(&config.themes_dir).list_available().len();
    println!("{available} themes available");
    Ok(())
}

fn init_directories(config: &AppConfig) -> [&Path; 2] {
    [config.themes_dir.as_path(), config.log.dir.as_path()]
}

fn ensure_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path).map_err(|error| format!("create {} failed: {error}", path.display()))
}
