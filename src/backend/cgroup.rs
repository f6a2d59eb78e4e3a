/*!
 * Container cgroups
 * Per-container cgroup v2 directories for limits and accounting
 *
 * Every container gets a cgroup when the v2 hierarchy is writable; it
 * carries the configured limits and supplies whole-container CPU and memory
 * figures. Both are best-effort: without a usable hierarchy the container
 * still runs and accounting falls back to procfs. A warning is logged only
 * when limits were requested.
 */

use crate::container::config::ResourceLimits;
use crate::core::types::{HostPid, Nanos};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
const CGROUP_PARENT: &str = "process-containers";

/// Creates and removes per-container cgroups under one parent
#[derive(Debug, Clone)]
pub struct CgroupManager {
    root: PathBuf,
}

impl CgroupManager {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_CGROUP_ROOT)
    }

    /// Use a different cgroup v2 mount point
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether a unified (v2) hierarchy is mounted at the root
    pub fn is_available(&self) -> bool {
        self.root.join("cgroup.controllers").exists()
    }

    /// Create a cgroup named `name` carrying `limits`
    ///
    /// Returns `None` when cgroups are unusable.
    pub fn create(&self, name: &str, limits: &ResourceLimits) -> Option<Cgroup> {
        if !self.is_available() {
            if limits.is_empty() {
                debug!("cgroups v2 not available for {}", name);
            } else {
                warn!("cgroups v2 not available, skipping resource limits for {}", name);
            }
            return None;
        }

        let dir = self.root.join(CGROUP_PARENT).join(name);
        if let Err(e) = fs::create_dir_all(&dir) {
            if limits.is_empty() {
                debug!("Cannot create cgroup {}: {}", dir.display(), e);
            } else {
                warn!(
                    "Failed to create cgroup directory {}: {}. Skipping resource limits.",
                    dir.display(),
                    e
                );
            }
            return None;
        }

        let cgroup = Cgroup { path: dir };

        if let Some(memory) = limits.memory_bytes {
            cgroup.write("memory.max", &memory.to_string());
        }
        if let Some(weight) = limits.cpu_weight {
            cgroup.write("cpu.weight", &weight.to_string());
        }
        if let Some(max_pids) = limits.max_pids {
            cgroup.write("pids.max", &max_pids.to_string());
        }

        info!("Created cgroup {} with {:?}", cgroup.path.display(), limits);
        Some(cgroup)
    }
}

impl Default for CgroupManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One container's cgroup directory
#[derive(Debug)]
pub struct Cgroup {
    path: PathBuf,
}

impl Cgroup {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, file: &str, value: &str) {
        if let Err(e) = fs::write(self.path.join(file), value) {
            warn!("Failed to set {} = {} in {}: {}", file, value, self.path.display(), e);
        }
    }

    /// Move a process into this cgroup
    pub fn attach(&self, pid: u32) {
        if let Err(e) = fs::write(self.path.join("cgroup.procs"), pid.to_string()) {
            warn!("Failed to add PID {} to cgroup: {}", pid, e);
        } else {
            info!("Added PID {} to cgroup {}", pid, self.path.display());
        }
    }

    /// Pids currently in the cgroup
    pub fn procs(&self) -> Vec<HostPid> {
        fs::read_to_string(self.path.join("cgroup.procs"))
            .map(|content| parse_procs(&content))
            .unwrap_or_default()
    }

    /// CPU time charged to the cgroup, from `cpu.stat`
    pub fn cpu_usage(&self) -> Option<Nanos> {
        let content = fs::read_to_string(self.path.join("cpu.stat")).ok()?;
        parse_usage_usec(&content).map(|usec| usec.saturating_mul(1_000))
    }

    /// Memory charged to the cgroup, from `memory.current`
    pub fn memory_current(&self) -> Option<u64> {
        fs::read_to_string(self.path.join("memory.current"))
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Remove the directory; only succeeds once every member exited
    pub fn remove(self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir(&self.path) {
            warn!("Failed to remove cgroup {}: {}", self.path.display(), e);
        } else {
            info!("Removed cgroup {}", self.path.display());
        }
    }
}

fn parse_procs(content: &str) -> Vec<HostPid> {
    content.lines().filter_map(|l| l.trim().parse().ok()).collect()
}

fn parse_usage_usec(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(' ')?;
        if key == "usage_usec" {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
