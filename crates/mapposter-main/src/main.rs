use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod color_cmd;
mod config;
mod config_cmd;
mod home;
mod logging;
mod style_cmd;
mod theme_cmd;

use color_cmd::ColorArgs;
use home::MapposterHome;
use style_cmd::StyleArgs;
use theme_cmd::ThemeArgs;

#[derive(Parser, Debug)]
#[command(
    name = "mapposter",
    version,
    about = "map poster theme editor and AI styling"
)]
struct Cli {
    /// Home directory; defaults to $MAPPOSTER_HOME, then ~/.mapposter.
    #[arg(long, global = true)]
    conf_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: RootCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum RootCommand {
    /// Manage saved themes.
    Theme(ThemeArgs),
    /// Color conversion and palette parsing.
    Color(ColorArgs),
    /// AI restyling of rendered posters.
    Style(StyleArgs),
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ConfigSubcommand {
    /// Create the home directory tree and a default mapposter.toml.
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let home = MapposterHome::resolve(cli.conf_dir.as_deref());
    if let Err(error) = run(cli.command, &home).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run(command: RootCommand, home: &MapposterHome) -> Result<(), String> {
    if let RootCommand::Config(ConfigArgs {
        command: ConfigSubcommand::Init,
    }) = command
    {
        return config_cmd::run_config_init(home);
    }

    let config = config::load_app_config(home)?;
    logging::init_tracing(&config.log);
    tracing::debug!(home = %home.root().display(), "loaded configuration");

    match command {
        RootCommand::Theme(args) => theme_cmd::run_theme_command(args.command, &config).await,
        RootCommand::Color(args) => color_cmd::run_color_command(args.command),
        RootCommand::Style(args) => style_cmd::run_style_command(args.command, &config).await,
        RootCommand::Config(_) => Ok(()),
    }
}
