use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

const TEST_CONFIG: &str = r#"
[remote]
token = ""

[style]
api_token = "r8_offline"
warm_up_secs = 0
backoff_secs = 0
api_base = "http://127.0.0.1:9"
"#;

fn mapposter(conf_dir: &Path, args: &[&str]) -> Output {
    Command::new(mapposter_binary_path())
        .arg("--conf-dir")
        .arg(conf_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("execute mapposter binary")
}

fn seeded_home() -> tempfile::TempDir {
    let conf_dir = tempdir().expect("create temp conf dir");
    fs::write(conf_dir.path().join("mapposter.toml"), TEST_CONFIG).expect("seed config");
    conf_dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn local_theme_lifecycle_save_show_list_delete() {
    let conf_dir = seeded_home();
    let home = conf_dir.path();

    let saved = mapposter(
        home,
        &[
            "theme",
            "save",
            "warm earth",
            "--set",
            "water=#1e90ff",
            "--oklch",
            "parks=0.5, 0, 0",
            "--local-only",
        ],
    );
    assert!(saved.status.success(), "stderr: {}", stderr(&saved));
    assert!(stdout(&saved).contains("parks: #636363"));
    assert!(home.join("themes").join("warm_earth.json").is_file());

    let shown = mapposter(home, &["theme", "show", "warm_earth"]);
    assert!(shown.status.success(), "stderr: {}", stderr(&shown));
    let shown = stdout(&shown);
    assert!(shown.starts_with("Warm Earth\nSaved from editor - warm_earth\n"));
    assert!(shown.contains("#1E90FF"));

    let listed = mapposter(home, &["theme", "list"]);
    assert_eq!(stdout(&listed), "warm_earth\n");

    let deleted = mapposter(home, &["theme", "delete", "warm_earth", "--local-only"]);
    assert!(deleted.status.success(), "stderr: {}", stderr(&deleted));
    assert!(!home.join("themes").join("warm_earth.json").exists());

    let listed = mapposter(home, &["theme", "list"]);
    assert!(!stdout(&listed).contains("warm_earth"));
}

#[test]
fn save_without_remote_token_falls_back_to_local() {
    let conf_dir = seeded_home();
    let output = mapposter(conf_dir.path(), &["theme", "save", "noir"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(conf_dir.path().join("themes").join("noir.json").is_file());
}

#[test]
fn save_with_name_and_description_overrides_derived_labels() {
    let conf_dir = seeded_home();
    let home = conf_dir.path();
    let saved = mapposter(
        home,
        &[
            "theme",
            "save",
            "dusk",
            "--name",
            "Terra Cotta",
            "--description",
            "Evening reds",
            "--local-only",
        ],
    );
    assert!(saved.status.success(), "stderr: {}", stderr(&saved));

    let shown = mapposter(home, &["theme", "show", "dusk"]);
    assert!(stdout(&shown).starts_with("Terra Cotta\nEvening reds\n"));
}

#[test]
fn reserved_theme_id_is_rejected() {
    let conf_dir = seeded_home();
    let output = mapposter(conf_dir.path(), &["theme", "save", "hidden_themes", "--local-only"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!conf_dir.path().join("themes").join("hidden_themes.json").exists());
}

#[test]
fn invalid_theme_id_is_rejected() {
    let conf_dir = seeded_home();
    let output = mapposter(conf_dir.path(), &["theme", "save", "../escape", "--local-only"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error:"));
}

#[test]
fn color_commands_convert_and_parse() {
    let conf_dir = seeded_home();

    let oklch = mapposter(conf_dir.path(), &["color", "oklch", "oklch(100% 0 0)"]);
    assert_eq!(stdout(&oklch), "#FFFFFF\n");

    let hex = mapposter(conf_dir.path(), &["color", "hex", "8b4513"]);
    assert_eq!(stdout(&hex), "#8B4513  rgb(139, 69, 19)\n");

    let palette_path = conf_dir.path().join("palette.txt");
    fs::write(&palette_path, "Water: 0, 0, 0\nnot a line\n").expect("write palette");
    let palette = mapposter(
        conf_dir.path(),
        &["color", "palette", palette_path.to_str().expect("utf-8 path")],
    );
    assert!(palette.status.success(), "stderr: {}", stderr(&palette));
    assert!(stdout(&palette).contains("#000000"));

    let bad = mapposter(conf_dir.path(), &["color", "oklch", "1.2, 0.1, 10"]);
    assert_eq!(bad.status.code(), Some(1));
}

#[test]
fn style_run_reports_missing_input_without_contacting_backend() {
    let conf_dir = seeded_home();
    let missing = conf_dir.path().join("absent.png");
    let output = mapposter(
        conf_dir.path(),
        &["style", "run", missing.to_str().expect("utf-8 path")],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("InputMissing"),
        "stderr: {}",
        stderr(&output)
    );
}

fn mapposter_binary_path() -> PathBuf {
    for key in ["CARGO_BIN_EXE_mapposter", "NEXTEST_BIN_EXE_mapposter"] {
        if let Some(path) = std::env::var_os(key) {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/debug/mapposter")
}
