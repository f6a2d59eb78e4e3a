/*!
 * Core Types
 * Value types shared by the container core and its backends
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ContainerError;

/// Process ID as seen from the host pid namespace
pub type HostPid = u32;

/// CPU time in nanoseconds
pub type Nanos = u64;

/// Point-in-time memory usage of a container, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryInfo {
    /// Virtual / committed size
    pub allocated: u64,
    /// Physical working set
    pub resident: u64,
    /// Pages shared with other processes
    pub shared: u64,
}

/// Execution unit selector for CPU accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuCore {
    /// Aggregate over every unit
    All,
    /// One unit, indexed within the container's allocation
    Core(u32),
}

impl CpuCore {
    /// Wire value for the aggregate selector
    pub const ALL_INDEX: i32 = -1;

    pub fn index(self) -> i32 {
        match self {
            CpuCore::All => Self::ALL_INDEX,
            CpuCore::Core(k) => k as i32,
        }
    }
}

impl TryFrom<i32> for CpuCore {
    type Error = ContainerError;

    fn try_from(index: i32) -> Result<Self, Self::Error> {
        match index {
            Self::ALL_INDEX => Ok(CpuCore::All),
            k if k >= 0 => Ok(CpuCore::Core(k as u32)),
            k => Err(ContainerError::OutOfBounds {
                index: i64::from(k),
                available: 0,
            }),
        }
    }
}

impl fmt::Display for CpuCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuCore::All => write!(f, "all"),
            CpuCore::Core(k) => write!(f, "core{}", k),
        }
    }
}

/// One network interface and the addresses assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub ips: Vec<String>,
}

impl NetworkInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ips: Vec::new(),
        }
    }

    pub fn with_ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ips.extend(ips.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ips(&self) -> &[String] {
        &self.ips
    }
}
