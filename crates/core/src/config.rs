use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::Error;
use crate::types::Signal;

/// Prefix of the environment variables read by [`ShutdownCfg::from_env`].
pub const ENV_PREFIX: &str = "GRACEFUL_";

/// Shutdown parameters. Every key is optional; missing or unparsable
/// values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownCfg {
    /// Deadline for the callback join, seconds. `0` waits forever.
    pub callback_timeout_secs: u64,
    /// Status handed to the terminate function by the signal manager.
    pub exit_code: i32,
    /// Signal names; empty means interrupt + terminate.
    pub signals: Vec<String>,
}

impl Default for ShutdownCfg {
    fn default() -> Self {
        Self {
            callback_timeout_secs: 0,
            exit_code: 0,
            signals: Vec::new(),
        }
    }
}

impl ShutdownCfg {
    /// Load from a JSON document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `GRACEFUL_*` environment variables, e.g. `GRACEFUL_CALLBACK_TIMEOUT_SECS=10`.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            callback_timeout_secs: get_or(m, "callback_timeout_secs", d.callback_timeout_secs),
            exit_code: get_or(m, "exit_code", d.exit_code),
            signals: m
                .get("signals")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(d.signals),
        }
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        (self.callback_timeout_secs > 0).then(|| Duration::from_secs(self.callback_timeout_secs))
    }

    /// Parse the configured signal names.
    pub fn signals(&self) -> Result<Vec<Signal>, Error> {
        self.signals.iter().map(|s| s.parse()).collect()
    }

    /// (key, value, description) triples, for logging the effective config.
    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("callback_timeout_secs", self.callback_timeout_secs.to_string(), "Callback join deadline seconds (0 = none)"),
            ("exit_code", self.exit_code.to_string(), "Exit status after a signal-triggered shutdown"),
            ("signals", self.signals.join(","), "Signals that trigger shutdown"),
        ]
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_map_falls_back_per_key() {
        let map: HashMap<String, String> = [
            ("callback_timeout_secs".to_string(), "15".to_string()),
            ("exit_code".to_string(), "not-a-number".to_string()),
            ("signals".to_string(), "SIGTERM, hup,".to_string()),
        ]
        .into_iter()
        .collect();

        let cfg = ShutdownCfg::from_map(&map);
        assert_eq!(cfg.callback_timeout_secs, 15);
        assert_eq!(cfg.exit_code, 0);
        assert_eq!(cfg.signals, vec!["SIGTERM", "hup"]);
        assert_eq!(cfg.signals().unwrap(), vec![Signal::Terminate, Signal::Hangup]);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        assert_eq!(ShutdownCfg::default().callback_timeout(), None);
        let cfg = ShutdownCfg { callback_timeout_secs: 3, ..Default::default() };
        assert_eq!(cfg.callback_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn load_json_with_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"exit_code": 3}}"#).unwrap();

        let cfg = ShutdownCfg::load(file.path()).unwrap();
        assert_eq!(cfg.exit_code, 3);
        assert_eq!(cfg.callback_timeout_secs, 0);
        assert!(cfg.signals.is_empty());
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "exit_code = 3").unwrap();

        assert!(matches!(ShutdownCfg::load(file.path()), Err(Error::ConfigParse { .. })));
        assert!(matches!(
            ShutdownCfg::load("/nonexistent/graceful.json"),
            Err(Error::ConfigRead { .. })
        ));
    }

    #[test]
    fn invalid_signal_name_is_an_error() {
        let cfg = ShutdownCfg { signals: vec!["SIGNOPE".into()], ..Default::default() };
        assert!(matches!(cfg.signals(), Err(Error::InvalidSignal(_))));
    }
}
