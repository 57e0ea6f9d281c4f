mod commands;

use bizdesk::api::{ApiClient, Session, SqliteStore};
use bizdesk::config::Config;
use bizdesk::logging;
use bizdesk::query::QueryCache;
use bizdesk::resources::Hooks;
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "bizdesk")]
#[command(about = "Command-line client for the business-management API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/bizdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log file (default: $XDG_DATA_HOME/bizdesk/bizdesk.log)
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Increase log verbosity (-v, -vv, -vvv)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = match args.log_file.clone().or_else(logging::default_log_path) {
    Some(path) => Some(logging::init(args.verbose, &path)?),
    None => None,
  };

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let session = Session::restore(SqliteStore::open()?)?;
  if let Some(token) = Config::env_token() {
    session.set_transient(token);
  }

  let client = ApiClient::new(
    config.api.resolved_base_url()?,
    config.api.timeout(),
    session,
  )?;
  let options = config.cache.options();
  let cache = QueryCache::new(options);
  let _gc = cache.spawn_gc(options.gc_time);
  let hooks = Hooks::new(client, cache);

  commands::run(args.command, &hooks, &config).await
}
