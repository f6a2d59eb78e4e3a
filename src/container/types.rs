/*!
 * Container Types
 * Handles, states and the owned snapshots handed to callers
 */

use crate::core::serde::{is_none, is_zero_u64, optional_system_time_micros, system_time_micros};
use crate::core::types::{HostPid, NetworkInterface};
use crate::core::{ContainerResult, HandleKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Lifecycle state of a container
///
/// `Created` and `Stopped` are both "not running" and accept the same
/// operations; they differ only in whether a process ever ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
}

impl ContainerState {
    #[inline]
    pub fn is_running(self) -> bool {
        self == ContainerState::Running
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerState::Created => write!(f, "created"),
            ContainerState::Running => write!(f, "running"),
            ContainerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Opaque handle to one container instance
///
/// Cheap to clone. Every clone refers to the same instance; once the
/// instance is destroyed all of them are stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    key: HandleKey,
    id: Arc<str>,
}

impl Container {
    pub(crate) fn new(key: HandleKey, id: &str) -> Self {
        Self {
            key,
            id: Arc::from(id),
        }
    }

    /// Caller-supplied identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> HandleKey {
        self.key
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.id, self.key)
    }
}

/// Serializable summary of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub key: HandleKey,
    pub state: ContainerState,
    #[serde(default, skip_serializing_if = "is_none")]
    pub pid: Option<HostPid>,
    pub root: PathBuf,
    #[serde(with = "system_time_micros")]
    pub created_at: SystemTime,
    #[serde(
        default,
        with = "optional_system_time_micros",
        skip_serializing_if = "is_none"
    )]
    pub started_at: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub start_count: u64,
    #[serde(default, skip_serializing_if = "is_none")]
    pub log_file: Option<PathBuf>,
}

/// Snapshot of the interfaces visible inside a container
///
/// Owned by the caller. It is never updated after creation; take a new
/// snapshot to observe changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    interfaces: Vec<NetworkInterface>,
}

impl NetworkStatus {
    pub(crate) fn new(interfaces: Vec<NetworkInterface>) -> Self {
        Self { interfaces }
    }

    pub fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn interface(&self, name: &str) -> Option<&NetworkInterface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Every address across every interface, in snapshot order
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.interfaces
            .iter()
            .flat_map(|i| i.ips.iter().map(String::as_str))
    }

    pub fn into_interfaces(self) -> Vec<NetworkInterface> {
        self.interfaces
    }
}

impl<'a> IntoIterator for &'a NetworkStatus {
    type Item = &'a NetworkInterface;
    type IntoIter = std::slice::Iter<'a, NetworkInterface>;

    fn into_iter(self) -> Self::IntoIter {
        self.interfaces.iter()
    }
}

/// Release a network snapshot
///
/// Consumes the snapshot, so it cannot be released twice. Dropping it has
/// the same effect.
pub fn network_status_destroy(status: NetworkStatus) -> ContainerResult<()> {
    drop(status);
    Ok(())
}
