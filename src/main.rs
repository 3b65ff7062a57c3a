// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! imgsort: ensemble image classifier and folder organizer

use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use imgsort::classifiers::{ClassifierRegistry, ImageCrateDecoder, ImageDecoder};
use imgsort::config::AppConfig;
use imgsort::error_log::{ErrorLog, FileErrorLog, NullErrorLog};
use imgsort::ollama::{model_matches, OllamaClient};
use imgsort::organizer::{list_eligible_images, CancellationToken, Organizer, RunOutcome};
use imgsort::reporter::{ConsoleReporter, RunReporter, SilentReporter};
use imgsort::{ImgsortError, Result};

/// imgsort CLI - sort images into category folders by classifier vote
#[derive(Parser, Debug)]
#[command(name = "imgsort")]
#[command(version)]
#[command(about = "Classify images with several voting models and file them by category", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every image in a folder and move it into a category folder
    Organize {
        /// Source folder (overrides config)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Destination root (default: dated folder next to the source)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Skip Ollama health check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Classify images without moving them
    Classify {
        /// Image file or folder
        path: PathBuf,

        /// Only show results at or above this confidence (0.0-1.0)
        #[arg(long, default_value = "0.0")]
        min_confidence: f64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show classifier and Ollama status
    Status {
        /// Check specific model availability
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,

    /// Edit configuration (categories, classifiers, ...) in $EDITOR
    Edit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet || cli.format != "text" {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Organize { source, dest, skip_health_check }) => {
            run_organize(config, source, dest, skip_health_check, cli.quiet, &cli.format).await
        }
        Some(Commands::Classify { path, min_confidence }) => {
            run_classify(config, path, min_confidence, &cli.format).await
        }
        Some(Commands::Config { action }) => {
            run_config_command(config, action, &cli.config).await
        }
        Some(Commands::Status { model }) => {
            run_status(config, model).await
        }
        None => {
            // Default: organize the configured source folder
            run_organize(config, None, None, false, cli.quiet, &cli.format).await
        }
    }
}

/// Fail early when Ollama voting is configured but the server is down
async fn check_ollama(config: &AppConfig) -> Result<()> {
    let settings = &config.classifiers.ollama;
    let client = OllamaClient::new(&settings.url, Duration::from_secs(settings.timeout_secs))?;

    info!("Checking Ollama availability...");
    if let Err(e) = client.health_check().await {
        return Err(ImgsortError::OllamaUnavailable(format!(
            "{}. Start Ollama, disable it in the config, or pass --skip-health-check",
            e
        )));
    }

    for wanted in &settings.models {
        if client.model_available(wanted).await? {
            info!("Vision model '{}' available", wanted);
        } else {
            warn!("Vision model '{}' not found", wanted);
            warn!("Try: ollama pull {}", wanted);
        }
    }
    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM; a second Ctrl+C exits immediately
fn install_cancel_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => warn!("Received Ctrl+C, stopping after the current image..."),
            _ = terminate => warn!("Received SIGTERM, stopping after the current image..."),
        }
        token.cancel();

        if signal::ctrl_c().await.is_ok() {
            warn!("Aborting");
            std::process::exit(130);
        }
    });
}

fn build_organizer(config: &AppConfig) -> Result<Organizer> {
    let registry = ClassifierRegistry::from_config(config)?;
    if registry.is_empty() {
        return Err(ImgsortError::Config("No classifiers enabled".to_string()));
    }
    info!("Loaded {} classifiers: {:?}", registry.len(), registry.classifier_ids());

    let error_log: Box<dyn ErrorLog> = if config.error_log.enabled {
        Box::new(FileErrorLog::new(PathBuf::from(&config.error_log.path)))
    } else {
        Box::new(NullErrorLog)
    };

    Ok(Organizer::new(registry, Box::new(ImageCrateDecoder), error_log))
}

/// Run one organize pass
async fn run_organize(
    config: AppConfig,
    source: Option<PathBuf>,
    dest: Option<PathBuf>,
    skip_health_check: bool,
    quiet: bool,
    format: &str,
) -> Result<()> {
    if config.classifiers.ollama.enabled {
        if skip_health_check {
            warn!("Skipping Ollama health check");
        } else {
            check_ollama(&config).await?;
        }
    }

    let organizer = build_organizer(&config)?;
    let run_config = config.run_config(source, dest, Local::now().date_naive());
    info!("Source folder: {:?}", run_config.source_folder);

    install_cancel_handler(organizer.cancellation_token());

    let console = ConsoleReporter::new(quiet);
    let reporter: &dyn RunReporter = if format == "text" { &console } else { &SilentReporter };
    let outcome = organizer.run(&run_config, reporter).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?),
        "jsonl" => {
            for file in outcome.files() {
                println!("{}", serde_json::to_string(file)?);
            }
            println!("{}", serde_json::to_string(&outcome_json(&outcome)["stats"])?);
        }
        _ => {}
    }

    Ok(())
}

fn outcome_json(outcome: &RunOutcome) -> serde_json::Value {
    let (status, destination) = match outcome {
        RunOutcome::Completed { destination_root, .. } => {
            ("completed", Some(destination_root.to_string_lossy().into_owned()))
        }
        RunOutcome::Cancelled { .. } => ("cancelled", None),
        RunOutcome::NoImagesFound => ("no_images_found", None),
    };
    serde_json::json!({
        "status": status,
        "destination_root": destination,
        "stats": outcome.stats(),
        "files": outcome.files(),
    })
}

/// Classify without moving anything
async fn run_classify(config: AppConfig, path: PathBuf, min_confidence: f64, format: &str) -> Result<()> {
    let registry = ClassifierRegistry::from_config(&config)?;
    if registry.is_empty() {
        return Err(ImgsortError::Config("No classifiers enabled".to_string()));
    }

    let files = if path.is_dir() {
        list_eligible_images(&path, &config.run_config(Some(path.clone()), None, Local::now().date_naive()).extensions)?
    } else {
        vec![path]
    };

    let decoder = ImageCrateDecoder;
    let mut results = Vec::new();

    for file in files {
        let image = match decoder.open(&file) {
            Ok(image) => image,
            Err(e) => {
                if format == "text" {
                    eprintln!("{}", e);
                }
                continue;
            }
        };

        let result = registry.classify(&image).await;
        if result.confidence < min_confidence {
            continue;
        }

        match format {
            "jsonl" => {
                let line = serde_json::json!({ "path": file.to_string_lossy(), "result": result });
                println!("{}", serde_json::to_string(&line)?);
            }
            "json" => results.push(serde_json::json!({ "path": file.to_string_lossy(), "result": result })),
            _ => println!(
                "{}: {} ({:.0}%, {} confidence, {} votes)",
                file.display(),
                result.label,
                result.confidence * 100.0,
                result.level().as_str(),
                result.votes_cast
            ),
        }
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    Ok(())
}

/// Run config commands
async fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(ImgsortError::Config(format!(
                    "{} already exists. Use --force to overwrite",
                    output.display()
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Source folder: {}", config.source_folder);
            println!("  Extensions: {}", config.extensions.join(", "));
            println!("  Categories: {}", config.categories.len());
            let registry = ClassifierRegistry::from_config(&config)?;
            println!("  Classifiers: {}", registry.classifier_ids().join(", "));
        }
        ConfigCommands::Edit => {
            if !config_path.exists() {
                config.save(config_path)?;
            }
            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            std::process::Command::new(editor)
                .arg(config_path)
                .status()?;
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig, model: Option<String>) -> Result<()> {
    let settings = &config.classifiers.ollama;
    let client = OllamaClient::new(&settings.url, Duration::from_secs(settings.timeout_secs))?;

    println!("imgsort v{} Status", env!("CARGO_PKG_VERSION"));
    println!("==================");

    match client.health_check().await {
        Ok(()) => println!("Ollama ({}): Running", client.base_url()),
        Err(e) => println!("Ollama: Error - {}", e),
    }

    match client.list_models().await {
        Ok(models) => {
            println!("\nAvailable models:");
            for m in &models {
                let wanted = settings.models.iter().any(|w| model_matches(m, w));
                println!("  {} {}", if wanted { "→" } else { " " }, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    if let Some(model) = model {
        match client.model_available(&model).await {
            Ok(true) => println!("\nModel '{}': available", model),
            Ok(false) => println!("\nModel '{}': not found (try: ollama pull {})", model, model),
            Err(e) => println!("\nModel '{}': Error - {}", model, e),
        }
    }

    println!("\nClassifiers (query order):");
    match ClassifierRegistry::from_config(&config) {
        Ok(registry) => {
            for id in registry.classifier_ids() {
                println!("  {}", id);
            }
        }
        Err(e) => println!("  Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Source folder: {}", config.source_folder);
    println!("  Categories: {}", config.categories.join(", "));

    Ok(())
}
