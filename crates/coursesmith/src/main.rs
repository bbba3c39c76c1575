use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::json;
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coursesmith::config::{resolve_config, LogFormat, WorkerConfig};
use coursesmith::db::asset_repo;
use coursesmith::worker::scheduler_from_config;
use coursesmith::{AssetStatus, AssetType, CoursesmithError, Database, NewAsset};

#[derive(Parser)]
#[command(name = "coursesmith-worker", version, about = "Turns source documents into training assets")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, env = "COURSESMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll for pending assets until interrupted (default)
    Run,
    /// Insert a new asset in `processing` state
    Enqueue {
        /// One of e-learning, video, process-map, job-aid
        asset_type: String,
        /// http(s)://, file:// or doc:// reference to the source document
        document_url: String,
        /// Display name of the source document
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        compliance: Option<String>,
    },
    /// Print one asset as JSON
    Status { id: String },
    /// Print asset counts per status as JSON
    Stats,
    /// Print the most recent assets as JSON
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn init_logging(format: LogFormat, verbose: u8) {
    // Bridge `log` records from library code into tracing.
    let _ = tracing_log::LogTracer::init();

    let default_directive = match verbose {
        0 => "coursesmith=info",
        1 => "coursesmith=debug",
        _ => "coursesmith=trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let (text, json) = match format {
        LogFormat::Text => (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("coursesmith-worker: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_format, cli.verbose);

    match execute(cli.command.unwrap_or(Command::Run), &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command, config: &WorkerConfig) -> Result<ExitCode, CoursesmithError> {
    let db = Database::open(&config.database_path)?;

    match command {
        Command::Run => run_worker(config, db),
        Command::Enqueue {
            asset_type,
            document_url,
            name,
            id,
            audience,
            tone,
            compliance,
        } => {
            if AssetType::from_str(&asset_type).is_err() {
                warn!(
                    "Asset type '{}' is not supported, the worker will mark it failed",
                    asset_type
                );
            }
            let mut new = NewAsset::new(asset_type, document_url);
            new.id = id;
            new.original_document_name = name.unwrap_or_default();
            new.audience = audience;
            new.tone = tone;
            new.compliance_text = compliance;

            let asset = asset_repo::insert(&db, &new)?;
            info!("Enqueued asset {}", asset.id);
            print_json(&asset);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status { id } => match asset_repo::find_by_id(&db, &id)? {
            Some(asset) => {
                print_json(&asset);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                error!("Asset {} not found", id);
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Stats => {
            let mut counts = serde_json::Map::new();
            for status in [
                AssetStatus::Processing,
                AssetStatus::Completed,
                AssetStatus::Failed,
            ] {
                let count = asset_repo::count_by_status(&db, status)?;
                counts.insert(status.as_str().to_string(), json!(count));
            }
            print_json(&counts);
            Ok(ExitCode::SUCCESS)
        }
        Command::List { status, limit } => {
            let status = match status.as_deref().map(AssetStatus::from_str).transpose() {
                Ok(status) => status,
                Err(e) => {
                    error!("{}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            let assets = asset_repo::list(&db, status, limit)?;
            print_json(&assets);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_worker(config: &WorkerConfig, db: Database) -> Result<ExitCode, CoursesmithError> {
    info!("Starting coursesmith worker v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutdown requested, finishing the current batch");
        let _ = shutdown_tx.send(true);
    }) {
        warn!("Failed to install signal handler: {}", e);
    }

    runtime.block_on(async {
        let scheduler = scheduler_from_config(config, db)?;
        scheduler.run(shutdown_rx).await;
        Ok::<_, CoursesmithError>(())
    })?;

    info!("Worker stopped");
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}
