use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

const MAPPOSTER_TOML_SAMPLE: &str = include_str!("../../../mapposter.toml.sample");

#[test]
fn config_init_creates_home_tree_and_config_from_sample() {
    let conf_dir = tempdir().expect("create temp conf dir");

    let output = run_config_init(conf_dir.path());
    assert_command_succeeded(&output);

    let config_path = conf_dir.path().join("mapposter.toml");
    assert!(config_path.is_file(), "expected {}", config_path.display());
    for dir in [conf_dir.path().join("themes"), conf_dir.path().join("logs")] {
        assert!(dir.is_dir(), "expected {}", dir.display());
    }

    let generated = fs::read_to_string(&config_path).expect("read generated mapposter.toml");
    assert_eq!(
        generated, MAPPOSTER_TOML_SAMPLE,
        "generated config should match sample"
    );
}

#[test]
fn config_init_keeps_existing_config() {
    let conf_dir = tempdir().expect("create temp conf dir");
    let config_path = conf_dir.path().join("mapposter.toml");
    let original = "[log]\nlevel = \"debug\"\n";
    fs::write(&config_path, original).expect("seed mapposter.toml");

    let output = run_config_init(conf_dir.path());
    assert_command_succeeded(&output);

    let preserved = fs::read_to_string(&config_path).expect("read preserved mapposter.toml");
    assert_eq!(preserved, original, "existing mapposter.toml must not be overwritten");
    assert!(String::from_utf8_lossy(&output.stdout).contains("kept:"));
}

#[test]
fn config_init_honors_mapposter_home_environment() {
    let home = tempdir().expect("create temp home");
    let output = Command::new(mapposter_binary_path())
        .env("MAPPOSTER_HOME", home.path())
        .arg("config")
        .arg("init")
        .output()
        .expect("execute mapposter binary");
    assert_command_succeeded(&output);

    assert!(home.path().join("mapposter.toml").is_file());
    assert!(home.path().join("themes").is_dir());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0 themes available"));
}

fn run_config_init(conf_dir: &Path) -> Output {
    Command::new(mapposter_binary_path())
        .arg("--conf-dir")
        .arg(conf_dir)
        .arg("config")
        .arg("init")
        .output()
        .expect("execute mapposter binary")
}

fn mapposter_binary_path() -> PathBuf {
    for key in ["CARGO_BIN_EXE_mapposter", "NEXTEST_BIN_EXE_mapposter"] {
        if let Some(path) = std::env::var_os(key) {
            return PathBuf::from(path);
        }
    }

    let fallback = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/debug/mapposter");
    if fallback.is_file() {
        return fallback;
    }

    panic!(
        "unable to resolve mapposter binary path from env (CARGO_BIN_EXE_mapposter / \
NEXTEST_BIN_EXE_mapposter) or fallback {}",
        fallback.display()
    );
}

fn assert_command_succeeded(output: &Output) {
    if output.status.success() {
        return;
    }
    panic!(
        "mapposter exited with status {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
