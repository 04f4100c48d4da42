//! kc-wizard: replay an answers file through the cluster provisioning wizard

mod answers;

use answers::Answers;
use clap::{Parser, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use kc_client::{
    ComponentSource, FileComponentSource, FileInventorySource, FileStore, FileVersionSource,
    Inventory, InventorySource, default_config_path,
};
use kc_wizard_core::{CatalogLoader, FlowKind, Output, Resources, Wizard, WizardConfig, WizardError};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// kc-wizard: non-interactive cluster provisioning wizard
#[derive(Parser, Debug)]
#[command(name = "kc-wizard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the wizard config file (default: ~/.kc-wizard/config.yaml)
    #[arg(long)]
    config: Option<String>,

    /// Version matrix YAML
    #[arg(long)]
    versions: String,

    /// Component catalog YAML
    #[arg(long)]
    components: Option<String>,

    /// Inventory YAML (nodes, registries, backup points)
    #[arg(long)]
    inventory: Option<String>,

    /// Answers file to replay
    #[arg(short, long)]
    answers: String,

    /// Wizard flow: cluster, template or provider (default: from answers, else cluster)
    #[arg(short, long)]
    flow: Option<String>,

    /// Directory submitted documents are written to
    #[arg(short, long, default_value = ".")]
    output_dir: String,

    /// Project the cluster or provider belongs to
    #[arg(short, long)]
    project: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file path (default: <temp_dir>/kc-wizard.log)
    #[arg(long)]
    log_file: Option<String>,

    /// Format of the printed document
    #[arg(long, value_enum, default_value = "yaml")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    color_eyre::install()?;

    // Log to a file so stdout carries only the document
    let log_path = resolve_log_path(cli.log_file.clone());
    let log_file = File::create(&log_path)?;

    let filter = if cli.debug {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .init();

    tracing::info!("Starting kc-wizard");

    let config = load_config(cli.config.as_deref()).await?;
    let resources = load_resources(&cli, config).await?;

    let answers_path = PathBuf::from(&cli.answers);
    let answers_text = tokio::fs::read_to_string(&answers_path)
        .await
        .wrap_err_with(|| format!("Cannot read answers {}", answers_path.display()))?;
    let answers = Answers::from_yaml(&answers_text)?;

    let flow_name = cli
        .flow
        .clone()
        .or_else(|| answers.flow.clone())
        .unwrap_or_else(|| "cluster".to_string());
    let flow = FlowKind::parse(&flow_name).ok_or_else(|| eyre!("Unknown flow: {}", flow_name))?;

    let mut wizard = match &answers.template {
        Some(source) => {
            let base = answers_path.parent().unwrap_or_else(|| Path::new("."));
            let template = source.load(base)?;
            tracing::info!("Starting from template {}", template.template_name);
            Wizard::with_template(flow, resources, &template.config)?
        }
        None => Wizard::new(flow, resources),
    };

    let store = FileStore::new(&cli.output_dir);
    match answers::replay(&mut wizard, &answers, &store).await {
        Ok(message) => {
            eprintln!("{}", message);
            let output = wizard.preview()?;
            println!("{}", render(&output, cli.format)?);
        }
        Err(err) => {
            report(&err);
            return Err(err.into());
        }
    }

    tracing::info!("Goodbye!");
    Ok(())
}

async fn load_config(path: Option<&str>) -> Result<WizardConfig> {
    let (path, explicit) = match path {
        Some(path) => (PathBuf::from(path), true),
        None => (default_config_path()?, false),
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            tracing::info!("Using config: {}", path.display());
            Ok(WizardConfig::from_yaml(&text)?)
        }
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(WizardConfig::default())
        }
        Err(e) => Err(e).wrap_err_with(|| format!("Cannot read config {}", path.display())),
    }
}

async fn load_resources(cli: &Cli, config: WizardConfig) -> Result<Resources> {
    let loader = CatalogLoader::new(FileVersionSource::new(&cli.versions), &config);
    let catalog = loader.load_catalog().await?;

    let components = match &cli.components {
        Some(path) => FileComponentSource::new(path).fetch_components().await?,
        None => Vec::new(),
    };
    let inventory = match &cli.inventory {
        Some(path) => FileInventorySource::new(path).fetch_inventory().await?,
        None => Inventory::default(),
    };

    Ok(Resources {
        catalog,
        components,
        inventory,
        config,
        project: cli.project.clone(),
    })
}

fn render(output: &Output, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(output)?,
        OutputFormat::Json => serde_json::to_string_pretty(output)?,
    })
}

/// Print per-field validation errors to stderr
fn report(err: &WizardError) {
    let errors = err.validation_errors();
    if errors.is_empty() {
        return;
    }
    eprintln!("{} field(s) need attention:", errors.len());
    for error in errors {
        eprintln!("  {}", error);
    }
}

/// Resolve the log file path, falling back to the platform temp directory.
fn resolve_log_path(log_file: Option<String>) -> PathBuf {
    match log_file {
        Some(path) => PathBuf::from(path),
        None => std::env::temp_dir().join("kc-wizard.log"),
    }
}
