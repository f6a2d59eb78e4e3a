/*!
 * Backend Types
 * Platform-agnostic types exchanged with isolation backends
 */

use crate::container::config::ContainerConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
///
/// These never cross the public API; the core maps them into
/// `ContainerError`.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process already running (PID {0})")]
    AlreadyRunning(u32),

    #[error("Process not running")]
    NotRunning,

    #[error("No network namespace attached")]
    NoNetworkNamespace,

    #[error("No such core: {index} ({available} available)")]
    NoSuchCore { index: u32, available: usize },

    #[error("Accounting data unavailable: {0}")]
    Accounting(String),

    #[error("OS error: {0}")]
    Os(#[from] nix::errno::Errno),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A container definition located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDefinition {
    /// Container id the definition was resolved for
    pub id: String,
    /// Directory holding the definition
    pub root: PathBuf,
    /// Search path entry that matched
    pub search_path: PathBuf,
}

impl ContainerDefinition {
    pub fn new(id: impl Into<String>, root: PathBuf, search_path: PathBuf) -> Self {
        Self {
            id: id.into(),
            root,
            search_path,
        }
    }

    /// Location of the optional on-disk configuration
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }
}

/// Everything a backend needs to prepare an isolation context
#[derive(Debug, Clone)]
pub struct PrepareRequest<'a> {
    pub definition: &'a ContainerDefinition,
    pub config: &'a ContainerConfig,
}

/// One process launch inside a prepared context
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    /// File that receives stdout/stderr, if output is captured
    pub log_file: Option<&'a Path>,
}
