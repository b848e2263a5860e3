//! CLI binary entry point for oep-upload

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use oep_upload::cli::commands::dataset::{DatasetArgs, handle_dataset};
#[cfg(feature = "cli")]
use oep_upload::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use oep_upload::cli::commands::order::{OrderArgs, handle_order};
#[cfg(feature = "cli")]
use oep_upload::cli::commands::upload::{UploadArgs, handle_upload};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "oep-upload")]
#[command(about = "Upload CSV/TSV data packages into the table API in foreign-key order")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Upload tables, parents before children
    Upload {
        /// Tables to upload ('table' or 'schema.table'); defaults to every table in the manifest
        tables: Vec<String>,
        /// Manifest file (datapackage.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Directory containing oep-upload.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
        /// Validate and batch rows without writing them
        #[arg(long)]
        dry_run: bool,
        /// Maximum rows per request
        #[arg(long)]
        batch_size: Option<usize>,
        /// Schema for table names without a 'schema.' prefix
        #[arg(long)]
        schema: Option<String>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the parents-first load order of tables
    Order {
        /// Tables to order ('table' or 'schema.table')
        #[arg(required = true)]
        tables: Vec<String>,
        /// Directory containing oep-upload.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
        /// Schema for table names without a 'schema.' prefix
        #[arg(long)]
        schema: Option<String>,
    },
    /// Ensure the manifest's dataset exists and assign its tables
    Dataset {
        /// Manifest file (datapackage.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Directory containing oep-upload.toml
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
        /// Do not assign manifest resources to the dataset
        #[arg(long)]
        no_assign: bool,
    },
    /// Write a sample oep-upload.toml
    InitConfig {
        /// Directory to write oep-upload.toml into
        #[arg(short, long, default_value = ".")]
        config: PathBuf,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt::time::ChronoUtc;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            tables,
            manifest,
            config,
            dry_run,
            batch_size,
            schema,
            json,
        } => {
            let args = UploadArgs {
                tables,
                manifest,
                config_dir: config,
                dry_run,
                batch_size,
                schema,
                json,
            };
            handle_upload(&args).context("upload failed")
        }
        Commands::Order {
            tables,
            config,
            schema,
        } => {
            let args = OrderArgs {
                tables,
                config_dir: config,
                schema,
            };
            handle_order(&args).context("could not resolve load order")
        }
        Commands::Dataset {
            manifest,
            config,
            no_assign,
        } => {
            let args = DatasetArgs {
                manifest,
                config_dir: config,
                no_assign,
            };
            handle_dataset(&args).context("dataset registration failed")
        }
        Commands::InitConfig { config, force } => {
            let args = InitArgs {
                config_dir: config,
                force,
            };
            handle_init(&args)
                .map(|_| ())
                .context("could not write config")
        }
    }
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
