mod api;
mod app;
mod cache;
mod config;
mod event;
mod filter;
mod session;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive
const LOG_ENV: &str = "TUDU_LOG";

#[derive(Parser, Debug)]
#[command(name = "tudu")]
#[command(about = "A terminal client for your to-do list")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tudu/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding TUDU_API_URL and the config file
  #[arg(short, long)]
  api_url: Option<String>,

  /// Forget the stored session and exit
  #[arg(long)]
  logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let data_dir = config.data_dir()?;

  // The terminal belongs to the TUI, so logs go to a file
  let _guard = init_logging(&data_dir.join("logs"))?;

  let storage = session::SqliteStorage::open(&data_dir.join("session.db"))?;
  let tokens = Arc::new(session::TokenStore::load(Arc::new(storage)));

  if args.logout {
    tokens.clear();
    info!("Stored session cleared from the command line");
    println!("Logged out.");
    return Ok(());
  }

  let api_url = args.api_url.unwrap_or_else(|| config.api_url());
  info!("Starting tudu against {}", api_url);

  let events = event::EventHandler::new();
  let navigator = Arc::new(event::EventNavigator::new(events.sender()));
  let client = api::TodoClient::new(&api_url, config.request_timeout(), tokens, navigator)?;
  let client = api::CachedTodoClient::new(client, config.stale_time());

  // Initialize and run the app
  let mut app = app::App::new(client);
  app.run(events).await?;

  Ok(())
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)?;
  let appender = tracing_appender::rolling::never(log_dir, "tudu.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
