use std::fs::{self, File};
use std::sync::{Arc, Mutex};

use avitolog::api::{HttpApi, SessionStore};
use avitolog::app::{App, Flags};
use avitolog::config::Config;
use avitolog::query::QueryClient;
use avitolog::runtime::Runtime;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs go to a file: the terminal belongs to the UI.
fn init_tracing(config: &Config) -> Result<()> {
    let Some(path) = config.log_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = File::create(&path)
        .wrap_err_with(|| format!("failed to open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("avitolog=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::parse();
    init_tracing(&config)?;

    let session = config
        .session_path()
        .map_or_else(SessionStore::in_memory, SessionStore::open);
    info!(api_url = %config.api_url, session = ?session.path(), "configured");

    let flags = Flags {
        api: Arc::new(HttpApi::new(config.api_url.clone(), session.clone())),
        session,
        queries: QueryClient::with_config(config.query_config()),
        route: config.open,
        listings_limit: config.listings_limit,
        read_terminal: true,
    };

    let mut terminal = ratatui::init();
    let runtime = Runtime::<App>::new(flags, config.frame_rate);
    let result = runtime.run(&mut terminal).await;
    ratatui::restore();

    result
}
