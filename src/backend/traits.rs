/*!
 * Backend Traits
 * Capability set the container core delegates isolation work to
 */

use super::types::*;
use crate::core::types::{CpuCore, HostPid, MemoryInfo, Nanos, NetworkInterface};

/// Process spawning under isolation
pub trait ProcessSpawner: Send + Sync {
    /// Backend-owned isolation state of one container
    type Context: Send;

    /// Build an isolation context without running anything
    ///
    /// Must be all-or-nothing: on error, nothing stays allocated.
    fn prepare(&self, request: &PrepareRequest<'_>) -> BackendResult<Self::Context>;

    /// Launch a process inside the context
    fn spawn(&self, ctx: &mut Self::Context, request: &SpawnRequest<'_>) -> BackendResult<HostPid>;

    /// Live check against the OS; reaps the process if it exited
    fn is_alive(&self, ctx: &mut Self::Context) -> bool;

    /// Host pid of the contained process, if one was spawned and not reaped
    fn pid(&self, ctx: &Self::Context) -> Option<HostPid>;

    /// Terminate and reap the contained process; no-op when none is running
    fn terminate(&self, ctx: &mut Self::Context) -> BackendResult<()>;

    /// Release every resource held by the context
    fn release(&self, ctx: Self::Context) -> BackendResult<()>;
}

/// Memory and CPU accounting
pub trait ResourceAccounting: ProcessSpawner {
    fn memory(&self, ctx: &Self::Context) -> BackendResult<MemoryInfo>;

    /// Number of execution units allocated to the container
    fn cpu_cores(&self, ctx: &Self::Context) -> BackendResult<usize>;

    fn cpu_usage(&self, ctx: &Self::Context, core: CpuCore) -> BackendResult<Nanos>;
}

/// Network interface enumeration
pub trait NetworkEnumerator: ProcessSpawner {
    fn interfaces(&self, ctx: &Self::Context) -> BackendResult<Vec<NetworkInterface>>;
}

/// Complete backend consumed by the framework
pub trait IsolationBackend: ResourceAccounting + NetworkEnumerator + 'static {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether the backend tolerates concurrent calls without arbitration
    fn is_concurrent(&self) -> bool {
        false
    }
}
