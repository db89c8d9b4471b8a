//! Configuration for loaders and the services built on them.

use std::env;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_YIELD_COUNT: usize = 16;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1);

/// Options that control how a [`Loader`](crate::Loader) executes its batches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Upper bound on the number of distinct keys passed to one batch function call.
    ///
    /// When a flush collects more keys than this, the keys are split into several calls. `None`
    /// (the default) sends every key of a flush in a single call.
    pub max_batch_size: Option<usize>,

    /// Maximum time a single batch function call may take.
    ///
    /// A batch that exceeds it fails every request in that batch with
    /// [`LoadError::Timeout`](crate::LoadError::Timeout). `None` waits indefinitely.
    #[serde(with = "optional_millis")]
    pub batch_timeout: Option<Duration>,

    /// How long the worker waits after the first op of a frame before collecting the rest.
    ///
    /// Gives callers on other runtime threads time to enqueue loads issued alongside the first
    /// one. `None` collects right away and relies on `yield_count` alone.
    #[serde(with = "optional_millis")]
    pub batch_delay: Option<Duration>,

    /// Maximum number of times the worker yields to the runtime while collecting a frame.
    ///
    /// Collection stops early once a yield brings in no new op.
    pub yield_count: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            batch_timeout: None,
            batch_delay: Some(DEFAULT_BATCH_DELAY),
            yield_count: DEFAULT_YIELD_COUNT,
        }
    }
}

impl LoaderConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = Some(timeout);
        self
    }

    /// Sets the collection delay. A zero duration disables it.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = (!delay.is_zero()).then_some(delay);
        self
    }

    pub fn with_yield_count(mut self, yield_count: usize) -> Self {
        self.yield_count = yield_count;
        self
    }
}

/// Top level configuration for the school services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub loader: LoaderConfig,
}

pub const MAX_BATCH_SIZE_VAR: &str = "SCHOOLGRAPH_MAX_BATCH_SIZE";
pub const BATCH_TIMEOUT_MS_VAR: &str = "SCHOOLGRAPH_BATCH_TIMEOUT_MS";
pub const BATCH_DELAY_MS_VAR: &str = "SCHOOLGRAPH_BATCH_DELAY_MS";

impl ServiceConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut loader = LoaderConfig::default();
        if let Some(raw) = lookup(MAX_BATCH_SIZE_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(0) | Err(_) => tracing::warn!(var = MAX_BATCH_SIZE_VAR, %raw, "ignoring value"),
                Ok(size) => loader.max_batch_size = Some(size),
            }
        }
        if let Some(raw) = lookup(BATCH_TIMEOUT_MS_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => loader.batch_timeout = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(var = BATCH_TIMEOUT_MS_VAR, %raw, "ignoring value"),
            }
        }
        if let Some(raw) = lookup(BATCH_DELAY_MS_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => loader = loader.with_batch_delay(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(var = BATCH_DELAY_MS_VAR, %raw, "ignoring value"),
            }
        }
        Self { loader }
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_unbounded() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config.loader.max_batch_size, None);
        assert_eq!(config.loader.batch_timeout, None);
        assert_eq!(config.loader.batch_delay, Some(DEFAULT_BATCH_DELAY));
        assert_eq!(config.loader.yield_count, DEFAULT_YIELD_COUNT);
    }

    #[test]
    fn zero_delay_disables_it() {
        let vars: HashMap<&str, &str> = [(BATCH_DELAY_MS_VAR, "0")].into_iter().collect();
        let config = ServiceConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.loader.batch_delay, None);
    }

    #[test]
    fn reads_variables() {
        let vars: HashMap<&str, &str> =
            [(MAX_BATCH_SIZE_VAR, "25"), (BATCH_TIMEOUT_MS_VAR, "1500"), (BATCH_DELAY_MS_VAR, "3")]
                .into_iter()
                .collect();
        let config = ServiceConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.loader.max_batch_size, Some(25));
        assert_eq!(config.loader.batch_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.loader.batch_delay, Some(Duration::from_millis(3)));
    }

    #[test]
    fn ignores_bad_values() {
        let vars: HashMap<&str, &str> =
            [(MAX_BATCH_SIZE_VAR, "0"), (BATCH_TIMEOUT_MS_VAR, "soon"), (BATCH_DELAY_MS_VAR, "-1")]
                .into_iter()
                .collect();
        let config = ServiceConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn deserializes_from_json() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"loader": {"max_batch_size": 10, "batch_timeout": 200, "yield_count": 4}}"#)
                .unwrap();
        assert_eq!(
            config.loader,
            LoaderConfig::default()
                .with_max_batch_size(10)
                .with_batch_timeout(Duration::from_millis(200))
                .with_yield_count(4)
        );

        let config: LoaderConfig = serde_json::from_str(r#"{"batch_delay": null}"#).unwrap();
        assert_eq!(config.batch_delay, None);
    }
}
