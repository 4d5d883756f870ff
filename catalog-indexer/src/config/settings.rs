//! Settings read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::IndexingError;
use catalog_indexer_pipeline::Backoff;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default watermark state file.
const DEFAULT_STATE_FILE: &str = "state.json";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Runtime settings, parsed once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub opensearch_url: String,
    pub state_file: PathBuf,
    /// Page size for change sets and extraction, and chunk size for bulk requests.
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub operation_timeout: Duration,
    pub backoff: Backoff,
    /// Directory overriding the compiled-in index mappings.
    pub mappings_dir: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `STATE_FILE`: Watermark state file (default: state.json)
    /// - `BATCH_SIZE`: Ids per page and documents per bulk request (default: 500)
    /// - `POLL_INTERVAL_SECS`: Wait between passes (default: 60)
    /// - `OPERATION_TIMEOUT_SECS`: Deadline for each query and bulk request (default: 30)
    /// - `BACKOFF_INITIAL_MS`, `BACKOFF_FACTOR`, `BACKOFF_CAP_MS`: Retry backoff (default: 100, 2, 10000)
    /// - `MAPPINGS_DIR`: Directory with `movies.json`, `persons.json`, `genres.json` (optional)
    /// - `LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| IndexingError::config("DATABASE_URL is required"))?;

        let settings = Self {
            database_url,
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            state_file: lookup("STATE_FILE")
                .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string())
                .into(),
            batch_size: parse(&lookup, "BATCH_SIZE", 500)?,
            poll_interval: Duration::from_secs(parse(&lookup, "POLL_INTERVAL_SECS", 60)?),
            operation_timeout: Duration::from_secs(parse(&lookup, "OPERATION_TIMEOUT_SECS", 30)?),
            backoff: Backoff {
                initial: Duration::from_millis(parse(&lookup, "BACKOFF_INITIAL_MS", 100)?),
                factor: parse(&lookup, "BACKOFF_FACTOR", 2)?,
                cap: Duration::from_millis(parse(&lookup, "BACKOFF_CAP_MS", 10_000)?),
            },
            mappings_dir: lookup("MAPPINGS_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_format: parse(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), IndexingError> {
        if self.database_max_connections == 0 {
            return Err(IndexingError::config("DATABASE_MAX_CONNECTIONS must be positive"));
        }
        if self.batch_size == 0 {
            return Err(IndexingError::config("BATCH_SIZE must be positive"));
        }
        if self.operation_timeout.is_zero() {
            return Err(IndexingError::config("OPERATION_TIMEOUT_SECS must be positive"));
        }
        if self.backoff.factor == 0 {
            return Err(IndexingError::config("BACKOFF_FACTOR must be positive"));
        }
        if self.backoff.initial > self.backoff.cap {
            return Err(IndexingError::config(
                "BACKOFF_INITIAL_MS must not exceed BACKOFF_CAP_MS",
            ));
        }
        Ok(())
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("invalid {}={:?}: {}", key, raw, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("DATABASE_URL", "postgres://localhost/catalog")]).unwrap();

        assert_eq!(settings.database_max_connections, 5);
        assert_eq!(settings.opensearch_url, "http://localhost:9200");
        assert_eq!(settings.state_file, PathBuf::from("state.json"));
        assert_eq!(settings.batch_size, 500);
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.operation_timeout, Duration::from_secs(30));
        assert_eq!(settings.backoff, Backoff::default());
        assert!(settings.mappings_dir.is_none());
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://db/catalog"),
            ("BATCH_SIZE", "100"),
            ("POLL_INTERVAL_SECS", "5"),
            ("BACKOFF_CAP_MS", "2000"),
            ("MAPPINGS_DIR", "/etc/catalog/mappings"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();

        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.backoff.cap, Duration::from_millis(2000));
        assert_eq!(settings.mappings_dir, Some(PathBuf::from("/etc/catalog/mappings")));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(matches!(settings(&[]), Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (key, value) in [
            ("BATCH_SIZE", "lots"),
            ("BATCH_SIZE", "0"),
            ("BACKOFF_FACTOR", "0"),
            ("OPERATION_TIMEOUT_SECS", "-1"),
            ("LOG_FORMAT", "xml"),
        ] {
            let result = settings(&[("DATABASE_URL", "postgres://db/catalog"), (key, value)]);
            assert!(
                matches!(result, Err(IndexingError::ConfigError(_))),
                "{}={} accepted",
                key,
                value
            );
        }
    }
}
