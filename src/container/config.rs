/*!
 * Container Configuration
 * The configuration blob accepted by `create`
 */

use crate::backend::ContainerDefinition;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_STOP_TIMEOUT_MS: u64 = 2_000;
const MAX_STOP_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Network view given to the container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// No network namespace is tracked; network queries fail
    #[default]
    None,
    /// Share the host namespace
    Host,
    /// Fresh, private network namespace
    Private,
}

/// Resource limits to enforce through cgroups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceLimits {
    pub memory_bytes: Option<u64>,
    /// cgroup v2 cpu.weight, 1-10000
    pub cpu_weight: Option<u32>,
    pub max_pids: Option<u32>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.memory_bytes.is_none() && self.cpu_weight.is_none() && self.max_pids.is_none()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_bytes == Some(0) {
            return Err(ConfigError::Invalid("memory_bytes must be positive".into()));
        }
        if let Some(weight) = self.cpu_weight {
            if !(1..=10_000).contains(&weight) {
                return Err(ConfigError::Invalid(format!(
                    "cpu_weight {} outside 1-10000",
                    weight
                )));
            }
        }
        if self.max_pids == Some(0) {
            return Err(ConfigError::Invalid("max_pids must be positive".into()));
        }
        Ok(())
    }
}

/// Parsed container configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct ContainerConfig {
    pub network: NetworkMode,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Host CPU indices to pin the container to
    pub cpus: Option<Vec<usize>>,
    pub limits: ResourceLimits,
    pub capture_output: bool,
    pub stop_timeout_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            network: NetworkMode::None,
            env: BTreeMap::new(),
            working_dir: None,
            cpus: None,
            limits: ResourceLimits::default(),
            capture_output: true,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl ContainerConfig {
    /// Parse a JSON blob; an empty blob yields the defaults
    pub fn parse(blob: &str) -> Result<Self, ConfigError> {
        let config = if blob.trim().is_empty() {
            Self::default()
        } else {
            serde_json::from_str(blob)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a resolved definition
    ///
    /// A non-empty blob wins; otherwise the definition's `config.json` is
    /// used when present.
    pub fn load(definition: &ContainerDefinition, blob: &str) -> Result<Self, ConfigError> {
        if !blob.trim().is_empty() {
            return Self::parse(blob);
        }

        let path = definition.config_file();
        if !path.is_file() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn with_network(mut self, network: NetworkMode) -> Self {
        self.network = network;
        self
    }

    pub fn with_cpus(mut self, cpus: Vec<usize>) -> Self {
        self.cpus = Some(cpus);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_output_capture(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_stop_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.stop_timeout_ms = timeout_ms;
        self
    }

    /// Working directory, with relative paths anchored at `root`
    pub fn resolve_working_dir(&self, root: &Path) -> Option<PathBuf> {
        self.working_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clean()
            } else {
                root.join(dir).clean()
            }
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in self.env.keys() {
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ConfigError::Invalid(format!(
                    "invalid environment variable name {:?}",
                    key
                )));
            }
        }
        if self.env.values().any(|v| v.contains('\0')) {
            return Err(ConfigError::Invalid(
                "environment values must not contain NUL".into(),
            ));
        }

        if let Some(ref cpus) = self.cpus {
            if cpus.is_empty() {
                return Err(ConfigError::Invalid("cpus must not be empty".into()));
            }
            let mut sorted = cpus.clone();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != cpus.len() {
                return Err(ConfigError::Invalid("cpus contains duplicates".into()));
            }
        }

        if self.stop_timeout_ms > MAX_STOP_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "stop_timeout_ms {} exceeds {}",
                self.stop_timeout_ms, MAX_STOP_TIMEOUT_MS
            )));
        }

        self.limits.validate()
    }
}
