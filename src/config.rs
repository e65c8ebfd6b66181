use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_API_BASE_URL: &str = "https://api.nature.global";
const DEFAULT_LISTEN_PORT: u16 = 9352;
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_CACHE_INVALIDATION_SECONDS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
/// One year
const MAX_CACHE_INVALIDATION_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to load oauth token file at {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("OAUTH_TOKEN not set. Set the Remo oauth token via OAUTH_TOKEN_FILE or OAUTH_TOKEN")]
    MissingToken,
    #[error("invalid value '{value}' for {key}: {source}")]
    InvalidNumber {
        key: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("{key} is {value}, must be at most {max}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        max: u64,
    },
    #[error("invalid METRICS_PATH '{0}': only letters, digits and '-._~/' are allowed")]
    InvalidMetricsPath(String),
}

/// Reads the oauth token file; swapped out in tests
pub trait TokenReader {
    fn read_file(&self, path: &Path) -> std::io::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileReader;

impl TokenReader for FileReader {
    fn read_file(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Runtime configuration of the exporter
#[derive(Clone)]
pub struct Config {
    pub api_base_url: String,
    pub oauth_token: String,
    pub listen_port: u16,
    pub metrics_path: String,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("oauth_token", &"<redacted>")
            .field("listen_port", &self.listen_port)
            .field("metrics_path", &self.metrics_path)
            .field("cache_ttl", &self.cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Loads the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok(), &FileReader)
    }

    /// Loads the configuration from `lookup`. Empty values count as unset.
    pub fn load<F>(lookup: F, reader: &dyn TokenReader) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let oauth_token = match get("OAUTH_TOKEN_FILE") {
            Some(path) => reader
                .read_file(Path::new(&path))
                .map_err(|source| ConfigError::TokenFile { path, source })?
                .trim()
                .to_string(),
            None => {
                info!("No oauth token file found. Falling back to environment variable");
                get("OAUTH_TOKEN").unwrap_or_default()
            }
        };
        if oauth_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let listen_port = parse_or_default(get("PORT"), "PORT", DEFAULT_LISTEN_PORT)?;
        let cache_secs = parse_or_default(
            get("CACHE_INVALIDATION_SECONDS"),
            "CACHE_INVALIDATION_SECONDS",
            DEFAULT_CACHE_INVALIDATION_SECONDS,
        )?;
        if cache_secs > MAX_CACHE_INVALIDATION_SECONDS {
            return Err(ConfigError::OutOfRange {
                key: "CACHE_INVALIDATION_SECONDS",
                value: cache_secs,
                max: MAX_CACHE_INVALIDATION_SECONDS,
            });
        }
        let timeout_secs = parse_or_default(
            get("REQUEST_TIMEOUT_SECONDS"),
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let metrics_path = normalize_path(
            get("METRICS_PATH").unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string()),
        );
        if !is_plain_path(&metrics_path) {
            return Err(ConfigError::InvalidMetricsPath(metrics_path));
        }

        Ok(Self {
            api_base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            oauth_token,
            listen_port,
            metrics_path,
            cache_ttl: Duration::from_secs(cache_secs),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Route paths must start with a slash
fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

/// A literal route: no `:`/`*` captures and nothing that needs escaping in HTML
fn is_plain_path(path: &str) -> bool {
    path.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '/'))
}

/// Parses an optional numeric setting, falling back to `default` when unset
fn parse_or_default<T>(
    val: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match val {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, value, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use tokio_test::assert_ok;

    struct StubReader(Result<String, io::ErrorKind>);

    impl TokenReader for StubReader {
        fn read_file(&self, _path: &Path) -> io::Result<String> {
            self.0.clone().map_err(io::Error::from)
        }
    }

    fn load(vars: &[(&str, &str)], reader: &dyn TokenReader) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(|key| vars.get(key).cloned(), reader)
    }

    #[test]
    fn test_missing_token() {
        let result = load(&[], &StubReader(Err(io::ErrorKind::NotFound)));
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }

    #[test]
    fn test_defaults() {
        let config = load(
            &[("OAUTH_TOKEN", "env_token")],
            &StubReader(Err(io::ErrorKind::NotFound)),
        )
        .unwrap();

        assert_eq!(config.oauth_token, "env_token");
        assert_eq!(config.api_base_url, "https://api.nature.global");
        assert_eq!(config.listen_port, 9352);
        assert_eq!(config.metrics_path, "/metrics");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_token_file_takes_precedence() {
        let config = load(
            &[
                ("OAUTH_TOKEN_FILE", "path/to/token"),
                ("OAUTH_TOKEN", "env_token"),
            ],
            &StubReader(Ok("  file_token\n".to_string())),
        )
        .unwrap();

        assert_eq!(config.oauth_token, "file_token");
    }

    #[test]
    fn test_token_file_unreadable() {
        let result = load(
            &[("OAUTH_TOKEN_FILE", "path/to/token")],
            &StubReader(Err(io::ErrorKind::NotFound)),
        );

        match result {
            Err(ConfigError::TokenFile { path, .. }) => assert_eq!(path, "path/to/token"),
            other => panic!("Expected token file error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_token_file() {
        let result = load(
            &[("OAUTH_TOKEN_FILE", "path/to/token")],
            &StubReader(Ok("\n".to_string())),
        );
        assert!(matches!(result, Err(ConfigError::MissingToken)));
    }

    #[test]
    fn test_overrides() {
        let config = assert_ok!(load(
            &[
                ("OAUTH_TOKEN", "env_token"),
                ("API_BASE_URL", "http://localhost:8080"),
                ("PORT", "9999"),
                ("METRICS_PATH", "/custom"),
                ("CACHE_INVALIDATION_SECONDS", "0"),
                ("REQUEST_TIMEOUT_SECONDS", "3"),
            ],
            &FileReader,
        ));

        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.listen_port, 9999);
        assert_eq!(config.metrics_path, "/custom");
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = load(
            &[("OAUTH_TOKEN", "env_token"), ("PORT", ""), ("METRICS_PATH", "")],
            &FileReader,
        )
        .unwrap();

        assert_eq!(config.listen_port, 9352);
        assert_eq!(config.metrics_path, "/metrics");
    }

    #[test]
    fn test_metrics_path_gets_leading_slash() {
        let config = load(
            &[("OAUTH_TOKEN", "env_token"), ("METRICS_PATH", "prom")],
            &FileReader,
        )
        .unwrap();

        assert_eq!(config.metrics_path, "/prom");
    }

    #[test]
    fn test_invalid_number() {
        let result = load(
            &[
                ("OAUTH_TOKEN", "env_token"),
                ("CACHE_INVALIDATION_SECONDS", "sixty"),
            ],
            &FileReader,
        );

        match result {
            Err(ConfigError::InvalidNumber { key, value, .. }) => {
                assert_eq!(key, "CACHE_INVALIDATION_SECONDS");
                assert_eq!(value, "sixty");
            }
            other => panic!("Expected invalid number error, got {other:?}"),
        }
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let config = assert_ok!(load(
            &[
                ("OAUTH_TOKEN", "env_token"),
                ("CACHE_INVALIDATION_SECONDS", "31536000"),
            ],
            &FileReader,
        ));
        assert_eq!(config.cache_ttl, Duration::from_secs(31_536_000));

        let result = load(
            &[
                ("OAUTH_TOKEN", "env_token"),
                ("CACHE_INVALIDATION_SECONDS", "18446744073709551615"),
            ],
            &FileReader,
        );
        match result {
            Err(ConfigError::OutOfRange { key, value, max }) => {
                assert_eq!(key, "CACHE_INVALIDATION_SECONDS");
                assert_eq!(value, u64::MAX);
                assert_eq!(max, 31_536_000);
            }
            other => panic!("Expected out of range error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_metrics_path() {
        for path in ["/:name", "/*rest", "/metrics'><script>", "/a b", "/{id}"] {
            let result = load(&[("OAUTH_TOKEN", "env_token"), ("METRICS_PATH", path)], &FileReader);
            assert!(
                matches!(result, Err(ConfigError::InvalidMetricsPath(ref p)) if p == path),
                "{path} should be rejected, got {result:?}"
            );
        }

        let config = assert_ok!(load(
            &[("OAUTH_TOKEN", "env_token"), ("METRICS_PATH", "/exporter/v1.0_remo-metrics")],
            &FileReader,
        ));
        assert_eq!(config.metrics_path, "/exporter/v1.0_remo-metrics");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = load(&[("OAUTH_TOKEN", "secret")], &FileReader).unwrap();
        assert!(!format!("{config:?}").contains("secret"));
    }
}
