//! siemview: command-line front end for the security-event store.
//!
//! Entry point: initialises structured logging, loads configuration from the
//! environment and runs one dashboard, search or export request.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::Layer as _;

use siemview::core::client::StoreClient;
use siemview::core::filter::SearchFilters;
use siemview::core::repository::EventRepository;
use siemview::core::service::EventService;
use siemview::export::{write_export, ExportFormat};
use siemview::util::config::AppConfig;
use siemview::util::constants;
use siemview::util::error::{Result, SiemError};

#[derive(Parser)]
#[command(name = "siemview")]
#[command(version)]
#[command(about = "Query, summarise and export security events", long_about = None)]
struct Cli {
    /// Per-attempt store timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print dashboard aggregates as JSON
    Dashboard,
    /// Print one page of matching events as JSON
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = constants::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },
    /// Export every matching event
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        /// json or csv
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Free-text pattern over the searchable fields
    #[arg(long)]
    query: Option<String>,

    /// Hostname substring (case-insensitive)
    #[arg(long)]
    hostname: Option<String>,

    /// Inclusive start date, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,

    /// Inclusive end date, YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    severity: Option<String>,

    #[arg(long)]
    event_type: Option<String>,
}

impl From<FilterArgs> for SearchFilters {
    fn from(args: FilterArgs) -> Self {
        Self {
            query: args.query,
            hostname: args.hostname,
            start_date: args.start_date,
            end_date: args.end_date,
            severity: args.severity,
            event_type: args.event_type,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = prepare_log_file();
    init_logging(log_file.as_deref());

    tracing::info!("{} v{} starting", constants::APP_NAME, constants::APP_VERSION);
    if let Some(path) = &log_file {
        tracing::info!("Debug log: {}", path.display());
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::from_env()?;

    let mut store_config = config.store_config();
    if let Some(secs) = cli.timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|e| SiemError::Config(format!("Invalid --timeout {secs}: {e}")))?;
        store_config = store_config.with_timeout(timeout);
    }
    tracing::debug!("Using store at {}", store_config.address());

    let client = StoreClient::new(store_config);
    let service = EventService::new(EventRepository::new(client));

    let code = match cli.command {
        Commands::Dashboard => {
            let data = service.get_dashboard_data();
            print_json(&data)?;
            if data.error.is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Commands::Search {
            filters,
            page,
            page_size,
        } => {
            let result = service.search(&filters.into(), page, page_size)?;
            print_json(&result)?;
            ExitCode::SUCCESS
        }
        Commands::Export {
            filters,
            format,
            output,
        } => {
            let content = service.export(&filters.into(), &format)?;
            match output {
                Some(path) => write_export(&content, &path)?,
                None => {
                    let format: ExportFormat = format.parse()?;
                    tracing::debug!("Writing {} to stdout", format.media_type());
                    print!("{content}");
                }
            }
            ExitCode::SUCCESS
        }
    };

    service.repository().store().close();
    Ok(code)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SiemError::Export(format!("Failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Resolve the log file under `SIEM_LOG_DIR`, creating the directory and
/// rotating an oversized file first. `None` means stderr-only logging.
fn prepare_log_file() -> Option<PathBuf> {
    let dir = PathBuf::from(std::env::var_os(constants::LOG_DIR_ENV)?);
    std::fs::create_dir_all(&dir).ok()?;
    let path = dir.join(constants::LOG_FILE_NAME);
    rotate_oversized(&path);
    Some(path)
}

/// Move `path` aside to `siemview.log.old` once it passes the size limit.
fn rotate_oversized(path: &Path) {
    let oversized = std::fs::metadata(path)
        .is_ok_and(|meta| meta.len() > constants::MAX_LOG_FILE_SIZE);
    if oversized {
        let _ = std::fs::rename(path, path.with_extension("log.old"));
    }
}

/// Install the tracing subscriber: stderr filtered by `RUST_LOG` (default
/// `info`) plus, when a log file is available, everything at `debug`.
fn init_logging(log_file: Option<&Path>) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    // `None` is a no-op layer, so an unopenable file leaves stderr only.
    let file_layer = log_file
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        })
        .map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_filter(EnvFilter::new("debug"))
        });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
