//! # hubward
//! Creates a model repository on the hub, downloads a pre-trained whisper
//! checkpoint and commits it to the repository.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use hubward::config::{self, Overrides};
use hubward::core::manifest::PublishConfig;
use hubward::core::protocol::{PipelineEvent, TransferEvent};
use hubward::fetch::ModelFetcher;
use hubward::{build_pipeline, load_catalog};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the repository, download the model and upload it (default)
    Publish(Settings),
    /// Only download the model checkpoint
    Fetch(Settings),
    /// List the models available in the catalog
    Models(Settings),
}

#[derive(Args, Debug, Default)]
struct Settings {
    /// Configuration file (defaults to ./hubward.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Destination repository, <owner>/<name>
    #[arg(long)]
    repo_id: Option<String>,
    /// Model name from the catalog (e.g. small, medium.en)
    #[arg(long)]
    model: Option<String>,
    /// Directory the checkpoint is downloaded into
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Path inside the repository; {model} and {ext} are substituted
    #[arg(long)]
    hub_path: Option<String>,
    /// Hub base URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Branch to commit to
    #[arg(long)]
    revision: Option<String>,
    /// Create the repository as private
    #[arg(long)]
    private: bool,
    /// Extra catalog entries (TOML)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Hub token (otherwise HF_TOKEN or the cached login token)
    #[arg(long)]
    token: Option<String>,
}

impl Settings {
    fn load(&self) -> Result<PublishConfig> {
        let overrides = Overrides {
            repo_id: self.repo_id.clone(),
            model: self.model.clone(),
            output_dir: self.output_dir.clone(),
            hub_path: self.hub_path.clone(),
            endpoint: self.endpoint.clone(),
            revision: self.revision.clone(),
            private: self.private.then_some(true),
            catalog: self.catalog.clone(),
        };
        config::load(self.config.as_deref(), &overrides)
    }
}

/// Progress bar for the transfer currently in flight.
#[derive(Default)]
struct TransferBar {
    bar: Option<ProgressBar>,
}

impl TransferBar {
    fn update(&mut self, event: TransferEvent) {
        match event {
            TransferEvent::Started(name) => {
                let bar = ProgressBar::new(0);
                let style = ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
                bar.set_style(style);
                bar.set_message(name);
                self.bar = Some(bar);
            }
            TransferEvent::Progress(current, total) => {
                if let Some(bar) = &self.bar {
                    if total > 0 {
                        bar.set_length(total);
                    }
                    bar.set_position(current);
                }
            }
            TransferEvent::Complete(_) => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

#[async_std::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli
        .command
        .unwrap_or_else(|| Commands::Publish(Settings::default()))
    {
        Commands::Publish(settings) => publish(settings).await,
        Commands::Fetch(settings) => fetch(settings).await,
        Commands::Models(settings) => list_models(settings),
    }
}

async fn publish(settings: Settings) -> Result<()> {
    let config = settings.load()?;
    let pipeline = build_pipeline(config, settings.token.as_deref())?;

    let mut bar = TransferBar::default();
    let report = pipeline
        .run(|event| match event {
            PipelineEvent::Initializing(repo_id) => {
                println!("📦 Initializing {}...", repo_id.to_string().cyan());
            }
            PipelineEvent::Downloading { file, url } => {
                println!("📥 Downloading model '{}' from {}", file.cyan(), url);
            }
            PipelineEvent::Uploading {
                local,
                hub_path,
                repo_id,
            } => {
                println!(
                    "📤 Uploading {} to {} on {}...",
                    local.display(),
                    hub_path.cyan(),
                    repo_id.to_string().cyan()
                );
            }
            PipelineEvent::Download(event) | PipelineEvent::Upload(event) => bar.update(event),
        })
        .await?;

    println!("✅ Repository: {}", report.repo_url.to_string().green());
    println!("✅ Commit: {}", report.commit.commit_url.green());
    Ok(())
}

async fn fetch(settings: Settings) -> Result<()> {
    let config = settings.load()?;
    let fetcher = ModelFetcher::new(load_catalog(&config)?);
    let url = fetcher.validate(&config.model)?;

    println!(
        "📥 Downloading model '{}' from {}",
        fetcher.target_file_name(&config.model).cyan(),
        url
    );
    let mut bar = TransferBar::default();
    let path = fetcher
        .fetch(&config.model, &config.output_dir, |event| bar.update(event))
        .await?;

    println!("✅ Download complete: {}", path.display().to_string().green());
    Ok(())
}

fn list_models(settings: Settings) -> Result<()> {
    let config = settings.load()?;
    let catalog = load_catalog(&config)?;
    for entry in catalog.entries() {
        println!("{:<10} {}", entry.name.bright_white(), entry.url);
    }
    Ok(())
}
