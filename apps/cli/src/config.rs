//! Client configuration.
//!
//! An optional TOML file supplies defaults; command-line flags override it.
//!
//! ```toml
//! method = "POST"
//! chunk_size = 8388608
//! timeout_secs = 120
//!
//! [headers]
//! Authorization = "Bearer abc"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use bigupload_transfer::{DEFAULT_CHUNK_SIZE, Method};
use serde::{Deserialize, Serialize};

/// Upload client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP method used for every chunk.
    #[serde(default = "default_method")]
    pub method: String,

    /// Chunk size in bytes (0 = library default).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-request timeout in seconds (0 = none).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra headers sent with every chunk, keyed by lower-case name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "PUT".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: default_method(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        for (name, value) in std::mem::take(&mut config.headers) {
            config.set_header(&name, value);
        }

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parsed HTTP method, upper-cased.
    pub fn method(&self) -> anyhow::Result<Method> {
        Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method {:?}", self.method))
    }

    /// Sets a header, replacing any existing entry whose name differs only in case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Splits a `"Name: value"` header argument.
pub fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header {raw:?} is not in \"Name: value\" form");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header {raw:?} has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.method().unwrap(), Method::PUT);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("chunk_size = 4096").unwrap();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.method, "PUT");
        assert!(config.headers.is_empty());
    }

    #[test]
    fn full_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigupload.toml");
        std::fs::write(
            &path,
            r#"
method = "post"
chunk_size = 2048
timeout_secs = 0

[headers]
Authorization = "Bearer abc"
X-Trace = "7"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.method().unwrap(), Method::POST);
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.headers["authorization"], "Bearer abc");
        assert_eq!(config.headers["x-trace"], "7");
    }

    #[test]
    fn header_names_collapse_case_insensitively() {
        let mut config = Config::default();
        config.set_header("authorization", "Bearer file");
        config.set_header("AUTHORIZATION", "Bearer other");
        config.set_header("Authorization", "Bearer cli");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["authorization"], "Bearer cli");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "chunk_size = \"big\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn invalid_method_is_rejected() {
        let config = Config {
            method: "NOT A METHOD".into(),
            ..Config::default()
        };
        assert!(config.method().is_err());
    }

    #[test]
    fn header_argument_is_split() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert_eq!(
            parse_header("X-Empty:").unwrap(),
            ("X-Empty".to_string(), String::new())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
