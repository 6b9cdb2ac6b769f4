//! Engine tunables: turn budget, worker cap, loop limits, timeouts.
//!
//! [`EngineConfig`] is an explicit value handed to the orchestrator, graph and pool, so
//! concurrent queries never share mutable configuration. [`EngineConfig::from_env`] reads
//! `MINDGRAPH_*` variables; [`EngineConfig::load`] first applies `.env` and XDG
//! `config.toml` through the `config` crate.

use std::path::Path;
use std::time::Duration;

/// Largest accepted `max_turn`.
pub const MAX_TURN_LIMIT: usize = 20;

/// Errors from reading or validating [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{key} out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },
    #[error("load config: {0}")]
    Load(#[from] env_config::LoadError),
}

/// Configuration for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum planner turns per run (1..=20).
    pub max_turn: usize,
    /// Concurrent search workers; `None` means unbounded.
    pub max_workers: Option<usize>,
    /// Visits of one node id beyond which the run is a loop.
    pub max_node_visits: u32,
    /// Recent visits inspected by the cycle check.
    pub loop_window: usize,
    /// Wall-clock budget for the whole run.
    pub execution_timeout: Duration,
    /// How long one drain step waits for the next graph event.
    pub drain_poll_interval: Duration,
    /// The only identifier plans may call methods on.
    pub plan_handle: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turn: 10,
            max_workers: Some(10),
            max_node_visits: 3,
            loop_window: 10,
            execution_timeout: Duration::from_secs(300),
            drain_poll_interval: Duration::from_millis(100),
            plan_handle: "graph".to_string(),
        }
    }
}

impl EngineConfig {
    /// Per-node search timeout: the run budget split evenly across turns.
    pub fn node_timeout(&self) -> Duration {
        self.execution_timeout / self.max_turn.max(1) as u32
    }

    pub fn with_max_turn(mut self, max_turn: usize) -> Self {
        self.max_turn = max_turn;
        self
    }

    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_node_visits(mut self, visits: u32) -> Self {
        self.max_node_visits = visits;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    /// Checks ranges; returns the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turn == 0 || self.max_turn > MAX_TURN_LIMIT {
            return Err(ConfigError::OutOfRange {
                key: "max_turn",
                reason: format!("{} not in 1..={}", self.max_turn, MAX_TURN_LIMIT),
            });
        }
        if self.max_workers == Some(0) {
            return Err(ConfigError::OutOfRange {
                key: "max_workers",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.max_node_visits == 0 {
            return Err(ConfigError::OutOfRange {
                key: "max_node_visits",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.loop_window < 4 {
            return Err(ConfigError::OutOfRange {
                key: "loop_window",
                reason: format!("{} < 4", self.loop_window),
            });
        }
        if self.execution_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "execution_timeout",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.plan_handle.is_empty() {
            return Err(ConfigError::OutOfRange {
                key: "plan_handle",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Builds a config from defaults overridden by `MINDGRAPH_*` variables, then validates it.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `MINDGRAPH_MAX_TURN` | `max_turn` |
    /// | `MINDGRAPH_MAX_WORKERS` | `max_workers` (`0` or `unbounded` = no cap) |
    /// | `MINDGRAPH_MAX_NODE_VISITS` | `max_node_visits` |
    /// | `MINDGRAPH_LOOP_WINDOW` | `loop_window` |
    /// | `MINDGRAPH_EXECUTION_TIMEOUT_SECS` | `execution_timeout` |
    /// | `MINDGRAPH_PLAN_HANDLE` | `plan_handle` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies `.env` / XDG config for `app_name` to the environment, then [`Self::from_env`].
    pub fn load(app_name: &str, override_dir: Option<&Path>) -> Result<Self, ConfigError> {
        env_config::load_and_apply(app_name, override_dir)?;
        Self::from_env()
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = get("MINDGRAPH_MAX_TURN") {
            config.max_turn = parse_number("MINDGRAPH_MAX_TURN", &v)?;
        }
        if let Some(v) = get("MINDGRAPH_MAX_WORKERS") {
            config.max_workers = match v.trim() {
                "unbounded" => None,
                raw => match parse_number::<usize>("MINDGRAPH_MAX_WORKERS", raw)? {
                    0 => None,
                    n => Some(n),
                },
            };
        }
        if let Some(v) = get("MINDGRAPH_MAX_NODE_VISITS") {
            config.max_node_visits = parse_number("MINDGRAPH_MAX_NODE_VISITS", &v)?;
        }
        if let Some(v) = get("MINDGRAPH_LOOP_WINDOW") {
            config.loop_window = parse_number("MINDGRAPH_LOOP_WINDOW", &v)?;
        }
        if let Some(v) = get("MINDGRAPH_EXECUTION_TIMEOUT_SECS") {
            let secs: u64 = parse_number("MINDGRAPH_EXECUTION_TIMEOUT_SECS", &v)?;
            config.execution_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("MINDGRAPH_PLAN_HANDLE") {
            config.plan_handle = v.trim().to_string();
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
