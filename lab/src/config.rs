//! Configuration.
//!
//! [`LabConfig`] holds the backend connection and timing settings, read from
//! the environment (a `.env` file is honoured). [`CaseConfig`] describes one
//! lab case: its label, the script to preload and where its bindings come from.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/vtl/";

/// Quiet period before a script is re-validated.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Delay between two polls of a running job.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Upper bound of the random delay added to each poll.
pub const DEFAULT_POLL_JITTER_MS: u64 = 250;

/// Per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Execution targets
// =============================================================================

/// Where a case runs. Selects both the synchronous endpoint and the way
/// bindings are initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionContext {
    /// Datasets fetched by URL, script evaluated in memory.
    InMemory,
    /// Local Spark, bindings taken from the case's local data.
    SparkLocal,
    /// Static Spark cluster.
    SparkStatic,
    /// Spark on Kubernetes.
    SparkKube,
}

impl ExecutionContext {
    /// Path of the synchronous execution endpoint, relative to the API URL.
    pub fn path(self) -> &'static str {
        match self {
            ExecutionContext::InMemory => "in-memory",
            ExecutionContext::SparkLocal => "spark-local",
            ExecutionContext::SparkStatic => "spark-static",
            ExecutionContext::SparkKube => "spark-kube",
        }
    }

    /// Remote cluster contexts take their bindings from `sparkClusterData`.
    pub fn is_remote_cluster(self) -> bool {
        matches!(self, ExecutionContext::SparkStatic | ExecutionContext::SparkKube)
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for ExecutionContext {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in-memory" | "memory" => Ok(ExecutionContext::InMemory),
            "spark-local" | "local" => Ok(ExecutionContext::SparkLocal),
            "spark-static" | "static" => Ok(ExecutionContext::SparkStatic),
            "spark-kube" | "kube" | "kubernetes" => Ok(ExecutionContext::SparkKube),
            other => Err(ConfigError::UnknownContext(other.to_string())),
        }
    }
}

/// Engine requested for an asynchronous job (`mode` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    Memory,
    Spark,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Memory => "MEMORY",
            ExecutionMode::Spark => "SPARK",
        }
    }
}

/// Cluster flavour for an asynchronous job (`type` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterType {
    Local,
    ClusterStatic,
    ClusterKubernetes,
}

impl ClusterType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterType::Local => "LOCAL",
            ClusterType::ClusterStatic => "CLUSTER_STATIC",
            ClusterType::ClusterKubernetes => "CLUSTER_KUBERNETES",
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Cadence of job polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Base delay before each poll.
    pub interval: Duration,
    /// Random extra delay in `[0, jitter]` added to each poll.
    pub jitter: Duration,
    /// Give up after this many polls. `None` polls until the job answers.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            jitter: Duration::from_millis(DEFAULT_POLL_JITTER_MS),
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    /// Delay before the next poll, jitter included. Saturates instead of overflowing.
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.interval;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.interval.saturating_add(Duration::from_millis(extra))
    }
}

// =============================================================================
// Lab configuration
// =============================================================================

/// Backend connection and timing settings.
#[derive(Debug, Clone)]
pub struct LabConfig {
    /// Base URL relative endpoint paths are resolved against.
    pub api_url: String,
    /// Bearer token attached to every request, if any.
    pub token: Option<String>,
    /// Quiet period before re-validation.
    pub debounce: Duration,
    /// Job polling cadence.
    pub poll: PollPolicy,
    /// Per-request timeout. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Engine for asynchronous jobs.
    pub mode: ExecutionMode,
    /// Cluster flavour for asynchronous jobs.
    pub cluster: ClusterType,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            poll: PollPolicy::default(),
            request_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            mode: ExecutionMode::Spark,
            cluster: ClusterType::ClusterKubernetes,
        }
    }
}

impl LabConfig {
    /// Read configuration from `VTL_LAB_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(url) = env::var("VTL_LAB_API_URL") {
            config.api_url = url;
        }
        config.token = env::var("VTL_LAB_TOKEN").ok().filter(|t| !t.is_empty());
        if let Some(ms) = parse_env::<u64>("VTL_LAB_DEBOUNCE_MS")? {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("VTL_LAB_POLL_INTERVAL_MS")? {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("VTL_LAB_POLL_JITTER_MS")? {
            config.poll.jitter = Duration::from_millis(ms);
        }
        config.poll.max_attempts = parse_env::<u32>("VTL_LAB_POLL_MAX_ATTEMPTS")?;
        if let Some(secs) = parse_env::<u64>("VTL_LAB_TIMEOUT_SECS")? {
            // 0 disables the timeout
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

fn parse_env<T: FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name: name.to_string(), value: raw }),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// Case configuration
// =============================================================================

/// A dataset fetched by URL and bound under `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub name: String,
    pub url: String,
}

/// One lab case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseConfig {
    /// Title shown above the editor.
    pub label: String,
    /// Datasets loaded for the in-memory context.
    pub in_memory_data: Vec<DatasetSource>,
    /// Bindings for the local Spark context.
    pub spark_local_data: Map<String, Value>,
    /// Bindings for the remote cluster contexts.
    pub spark_cluster_data: Map<String, Value>,
    /// URL of the script to preload.
    pub script: Option<String>,
    /// Bindings applied on top of every context's bindings.
    pub default_bindings: Map<String, Value>,
}

impl CaseConfig {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// URL the editor pulls variable suggestions from: the first in-memory dataset.
    pub fn suggester_url(&self) -> Option<&str> {
        self.in_memory_data.first().map(|d| d.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LabConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(2000));
        assert_eq!(config.poll.max_attempts, None);
        assert_eq!(config.mode.as_str(), "SPARK");
        assert_eq!(config.cluster.as_str(), "CLUSTER_KUBERNETES");
    }

    #[test]
    fn test_context_parsing() {
        assert_eq!("in-memory".parse::<ExecutionContext>().unwrap(), ExecutionContext::InMemory);
        assert_eq!("Kube".parse::<ExecutionContext>().unwrap(), ExecutionContext::SparkKube);
        assert!("mainframe".parse::<ExecutionContext>().is_err());
        assert!(ExecutionContext::SparkStatic.is_remote_cluster());
        assert!(!ExecutionContext::SparkLocal.is_remote_cluster());
    }

    #[test]
    fn test_poll_delay_within_jitter() {
        let policy = PollPolicy {
            interval: Duration::from_millis(100),
            jitter: Duration::from_millis(20),
            max_attempts: Some(3),
        };
        for _ in 0..50 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(120));
        }

        let fixed = PollPolicy { jitter: Duration::ZERO, ..policy };
        assert_eq!(fixed.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_poll_delay_saturates_on_huge_values() {
        let policy = PollPolicy {
            interval: Duration::from_millis(1),
            jitter: Duration::from_millis(u64::MAX),
            max_attempts: None,
        };
        for _ in 0..20 {
            assert!(policy.next_delay() >= Duration::from_millis(1));
        }

        let policy = PollPolicy {
            interval: Duration::MAX,
            jitter: Duration::from_millis(u64::MAX),
            max_attempts: None,
        };
        assert_eq!(policy.next_delay(), Duration::MAX);
    }

    #[test]
    fn test_case_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "label": "Basic",
                "inMemoryData": [{{"name": "ds1", "url": "http://data/ds1.json"}}],
                "sparkLocalData": {{"ds1": {{"type": "S3", "bucket": "b"}}}},
                "script": "http://scripts/basic.vtl",
                "defaultBindings": {{"threshold": 10}}
            }}"#
        )
        .unwrap();

        let case = CaseConfig::from_file(file.path()).unwrap();
        assert_eq!(case.label, "Basic");
        assert_eq!(case.in_memory_data.len(), 1);
        assert_eq!(case.suggester_url(), Some("http://data/ds1.json"));
        assert!(case.spark_cluster_data.is_empty());
        assert_eq!(case.default_bindings["threshold"], 10);
    }
}
