use std::path::PathBuf;

use clap::{Args, Subcommand};
use mapposter_style::{
    build_backend, describe_model_inputs, JobOutcome, StyleJob, StylingClient,
};
use serde_json::Value;

use crate::config::AppConfig;

#[derive(Args, Debug, Clone)]
pub struct StyleArgs {
    #[command(subcommand)]
    pub command: StyleCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StyleCommand {
    /// Restyle a rendered poster; the result is written next to it.
    Run(StyleRunArgs),
    /// List the input parameters a model accepts.
    Inputs {
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct StyleRunArgs {
    pub image: PathBuf,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub prompt: Option<String>,
    #[arg(long)]
    pub suffix: Option<String>,
}

pub async fn run_style_command(command: StyleCommand, config: &AppConfig) -> Result<(), String> {
    match command {
        StyleCommand::Run(args) => run_style(args, config).await,
        StyleCommand::Inputs { model } => {
            let model = model.unwrap_or_else(|| config.style.model.clone());
            list_model_inputs(&model, config).await
        }
    }
}

async fn run_style(args: StyleRunArgs, config: &AppConfig) -> Result<(), String> {
    let style = &config.style;
    let backend = build_backend(&style.backend_settings()).map_err(|error| error.to_string())?;
    let client = StylingClient::new(backend).pacing(style.pacing);
    let job = StyleJob::new(args.image)
        .model(args.model.unwrap_or_else(|| style.model.clone()))
        .prompt(args.prompt.unwrap_or_else(|| style.prompt.clone()))
        .output_suffix(args.suffix.unwrap_or_else(|| style.output_suffix.clone()));

    if client.is_available() && job.input_path().is_file() {
        println!(
            "waiting {}s before the first request, then up to {} attempts with {}s backoff",
            style.pacing.warm_up.as_secs(),
            style.pacing.attempts_per_mode(),
            style.pacing.backoff.as_secs()
        );
    }
    let job = client.run(job).await;
    match job.outcome() {
        Some(JobOutcome::Succeeded { output_path, bytes }) => {
            if job.mode_switched() {
                println!("model rejected the image input; styled from the prompt only");
            }
            println!(
                "saved: {} ({bytes} bytes, {} attempts)",
                output_path.display(),
                job.attempts()
            );
            Ok(())
        }
        Some(JobOutcome::Failed(error)) => Err(format!(
            "styling failed after {} attempts: {error}",
            job.attempts()
        )),
        None => Err("styling job ended without an outcome".to_string()),
    }
}

async fn list_model_inputs(model: &str, config: &AppConfig) -> Result<(), String> {
    let properties = describe_model_inputs(&config.style.backend_settings(), model)
        .await
        .map_err(|error| error.to_string())?;
    let Value::Object(properties) = properties else {
        return Err(format!("model {model} returned no input properties"));
    };
    let mut entries = properties.into_iter().collect::<Vec<_>>();
    entries.sort_by_key(|(name, schema)| {
        (
            schema
                .get("x-order")
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX),
            name.clone(),
        )
    });
    println!("inputs for {model}:");
    for (name, schema) in entries {
        let kind = schema
            .get("type")
            .and_then(Value::as_str)
            .or_else(|| schema.get("format").and_then(Value::as_str))
            .unwrap_or("any");
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("");
        println!("  {name} ({kind}) {description}");
    }
    Ok(())
}
