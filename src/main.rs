//! testshard CLI - shard instrumentation test classes across nodes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use testshard::config::{self, Config, DiscoveryConfig};
use testshard::descriptor::{RunDescriptor, RunParameters};
use testshard::discovery::{self, ClassDiscoverer, StaticDiscoverer};
use testshard::dispatch::{LoggingConsumer, dispatch};
use testshard::manifest::XmlManifest;

#[derive(Parser)]
#[command(name = "testshard")]
#[command(about = "Shard instrumentation test classes across nodes and devices", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "testshard.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[run]` section.
#[derive(Args, Debug, Default)]
struct RunOverrides {
    /// Total number of nodes
    #[arg(long)]
    total_nodes: Option<usize>,

    /// This node's zero-based index
    #[arg(long)]
    node_index: Option<usize>,

    /// Classes handed to a device per pull
    #[arg(long)]
    batch_size: Option<usize>,

    /// Comma-separated class patterns to include
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and print this node's run descriptor
    Plan {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Preview how this node's classes are handed out to devices
    Dispatch {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Number of simulated devices
        #[arg(short, long, default_value_t = 1)]
        workers: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate configuration file
    Validate,

    /// Initialize a new configuration file
    Init {
        /// Discovery type (list, command)
        #[arg(short, long, default_value = "list")]
        discovery: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Plan { overrides, format } => plan(&cli.config, overrides, &format).await,
        Commands::Dispatch {
            overrides,
            workers,
            format,
        } => dispatch_preview(&cli.config, overrides, workers, &format).await,
        Commands::Validate => validate_config(&cli.config),
        Commands::Init { discovery } => init_config(&discovery),
    }
}

fn run_parameters(config: &Config, overrides: RunOverrides) -> RunParameters {
    let mut params = RunParameters::from(&config.run);
    if let Some(total_nodes) = overrides.total_nodes {
        params.total_nodes = total_nodes;
    }
    if let Some(node_index) = overrides.node_index {
        params.node_index = node_index;
    }
    if let Some(batch_size) = overrides.batch_size {
        params.batch_size = batch_size;
    }
    if overrides.filter.is_some() {
        params.filter = overrides.filter;
    }
    params
}

async fn build_descriptor(config_path: &Path, overrides: RunOverrides) -> Result<RunDescriptor> {
    let config = config::load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    info!("Loaded configuration from {}", config_path.display());

    let params = run_parameters(&config, overrides);
    let manifest = XmlManifest::open(config.manifest.resolved_path())?;

    let discoverer: Box<dyn ClassDiscoverer> = match &config.discovery {
        Some(cfg) => discovery::from_config(cfg),
        None if params.needs_selection() => {
            bail!("Sharding or filtering requires a [discovery] section in the config")
        }
        None => Box::new(StaticDiscoverer::default()),
    };

    let descriptor = RunDescriptor::build(manifest, &discoverer, &params).await?;
    Ok(descriptor)
}

async fn plan(config_path: &Path, overrides: RunOverrides, format: &str) -> Result<()> {
    let descriptor = build_descriptor(config_path, overrides).await?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&descriptor)?;
            println!("{}", json);
        }
        _ => println!("{}", descriptor),
    }

    Ok(())
}

async fn dispatch_preview(
    config_path: &Path,
    overrides: RunOverrides,
    workers: usize,
    format: &str,
) -> Result<()> {
    let descriptor = build_descriptor(config_path, overrides).await?;

    let Some(queue) = descriptor.work_queue() else {
        match format {
            "json" => println!("null"),
            _ => println!("Not sharded: every device runs the full suite"),
        }
        return Ok(());
    };

    let consumers: Vec<LoggingConsumer> = (0..workers.max(1))
        .map(|i| LoggingConsumer::new(format!("worker-{}", i)))
        .collect();
    let report = dispatch(&queue, &consumers, descriptor.batch_size()).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Node {} of {}: {} classes across {} workers",
        descriptor.node_index(),
        descriptor.total_nodes(),
        report.dispatched(),
        consumers.len()
    );
    for assignment in &report.assignments {
        println!("  {} ({} classes)", assignment.consumer, assignment.class_count());
        for batch in &assignment.batches {
            println!("    {}", batch.join(", "));
        }
    }

    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    match config::load_config(config_path) {
        Ok(config) => {
            let params = RunParameters::from(&config.run);
            if let Err(e) = params.validate() {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }

            println!("Configuration is valid!");
            println!();
            println!("Settings:");
            println!("  Total nodes: {}", config.run.total_nodes);
            println!("  Node index: {}", config.run.node_index);
            println!("  Batch size: {}", config.run.batch_size);
            println!(
                "  Filter: {}",
                config.run.filter.as_deref().unwrap_or("(none)")
            );
            println!("  Manifest: {}", config.manifest.path.display());

            let discovery_name = match &config.discovery {
                Some(DiscoveryConfig::List(_)) => "list",
                Some(DiscoveryConfig::Command(_)) => "command",
                None => "(none)",
            };
            println!("  Discovery: {}", discovery_name);

            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_config(discovery: &str) -> Result<()> {
    let discovery_config = match discovery {
        "list" => {
            r#"[discovery]
type = "list"
path = "build/test-classes.txt""#
        }
        "command" => {
            r#"[discovery]
type = "command"
# Prints one test class per line (optionally Class#method)
command = "./scripts/list-test-classes.sh""#
        }
        _ => {
            eprintln!("Unknown discovery type: {}. Use: list, command", discovery);
            std::process::exit(1);
        }
    };

    let config = format!(
        r#"# testshard configuration file

[run]
total_nodes = 1
node_index = 0
batch_size = 5
# filter = "com.example.login.*, CheckoutTest"

[manifest]
path = "build/AndroidManifest.xml"

{}
"#,
        discovery_config
    );

    let path = PathBuf::from("testshard.toml");
    if path.exists() {
        eprintln!("testshard.toml already exists. Remove it first or edit manually.");
        std::process::exit(1);
    }

    std::fs::write(&path, config)?;
    println!("Created testshard.toml");
    println!();
    println!("Edit the configuration as needed, then run:");
    println!("  testshard plan");

    Ok(())
}
