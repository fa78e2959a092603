//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, value_parser};

use crate::api::SessionStore;
use crate::app::Route;
use crate::query::QueryConfig;

const LOG_FILE: &str = "avitolog.log";

/// Browse and comment on Avito listings from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "avitolog", version, about)]
pub struct Config {
    /// Backend base URL.
    #[arg(long, env = "AVITOLOG_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Where the sign-in token is kept [default: <config dir>/avitolog/session.json].
    #[arg(long, env = "AVITOLOG_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Log file [default: <cache dir>/avitolog/avitolog.log].
    #[arg(long, env = "AVITOLOG_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Redraws per second.
    #[arg(long, default_value_t = 30, value_parser = value_parser!(u32).range(1..=240))]
    pub frame_rate: u32,

    /// Number of listings on the home page (the backend allows at most 50).
    #[arg(long, default_value_t = 20, value_parser = value_parser!(u32).range(1..=50))]
    pub listings_limit: u32,

    /// Seconds fetched data stays fresh; 0 refetches on every page visit.
    #[arg(long, default_value_t = 0)]
    pub stale_time_secs: u64,

    /// Retries after a failed fetch. Client errors are never retried.
    #[arg(long, default_value_t = 3)]
    pub retry: u32,

    /// Page to open first, e.g. `/ad/42`.
    #[arg(long, default_value = "/")]
    pub open: Route,
}

impl Config {
    /// The session file, falling back to the platform config directory.
    #[must_use]
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session_file
            .clone()
            .or_else(SessionStore::default_path)
    }

    /// The log file, falling back to the platform cache directory.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("avitolog").join(LOG_FILE)))
    }

    #[must_use]
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            stale_time: Duration::from_secs(self.stale_time_secs),
            ..QueryConfig::default()
        }
        .with_retry(self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["avitolog"]).expect("defaults parse");
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.listings_limit, 20);
        assert_eq!(config.open, Route::Home);

        let queries = config.query_config();
        assert_eq!(queries.stale_time, Duration::ZERO);
        assert_eq!(queries.retry, 3);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "avitolog",
            "--api-url",
            "https://avitolog.example",
            "--session-file",
            "/tmp/session.json",
            "--stale-time-secs",
            "30",
            "--retry",
            "0",
            "--open",
            "/ad/42",
        ])
        .expect("flags parse");

        assert_eq!(config.api_url, "https://avitolog.example");
        assert_eq!(
            config.session_path(),
            Some(PathBuf::from("/tmp/session.json"))
        );
        assert_eq!(config.open, Route::Listing(42));
        assert_eq!(config.query_config().stale_time, Duration::from_secs(30));
        assert_eq!(config.query_config().retry, 0);
    }

    #[test]
    fn test_listings_limit_is_capped() {
        assert!(Config::try_parse_from(["avitolog", "--listings-limit", "51"]).is_err());
        assert!(Config::try_parse_from(["avitolog", "--listings-limit", "0"]).is_err());
    }

    #[test]
    fn test_unknown_route_opens_not_found() {
        let config =
            Config::try_parse_from(["avitolog", "--open", "/profile"]).expect("route parses");
        assert_eq!(config.open, Route::NotFound);
    }
}
