/*!
 * Simulation Backend
 * In-memory isolation backend for environments without OS privileges
 *
 * Processes are bookkeeping entries with deterministic, time-derived
 * counters. Faults (out-of-band death, missing commands, rejected
 * configurations) can be injected, and live contexts are counted so tests
 * can assert that nothing leaks.
 */

use super::traits::*;
use super::types::*;
use crate::container::config::{ContainerConfig, NetworkMode};
use crate::core::types::{CpuCore, HostPid, MemoryInfo, Nanos, NetworkInterface};
use dashmap::DashSet;
use log::info;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_CORES: usize = 4;
const FIRST_SIMULATED_PID: u32 = 10_000;

/// Default memory figures reported for a running simulated process
pub const SIMULATED_MEMORY: MemoryInfo = MemoryInfo {
    allocated: 64 * 1024 * 1024,
    resident: 16 * 1024 * 1024,
    shared: 4 * 1024 * 1024,
};

#[derive(Debug)]
struct SimProcess {
    pid: HostPid,
    started: Instant,
}

/// Isolation state of one simulated container
#[derive(Debug)]
pub struct SimContext {
    id: String,
    config: ContainerConfig,
    cores: usize,
    process: Option<SimProcess>,
}

impl SimContext {
    fn live(&self) -> BackendResult<&SimProcess> {
        self.process.as_ref().ok_or(BackendError::NotRunning)
    }
}

#[derive(Debug, Default)]
struct Faults {
    missing_commands: HashSet<String>,
    reject_prepare: bool,
}

/// Simulation-based backend
///
/// Clones share state, so a test can keep one clone for fault injection
/// while the framework owns another.
#[derive(Debug, Clone)]
pub struct SimulationBackend {
    next_pid: Arc<AtomicU32>,
    killed: Arc<DashSet<HostPid>>,
    faults: Arc<Mutex<Faults>>,
    live_contexts: Arc<AtomicUsize>,
    live_processes: Arc<AtomicUsize>,
    default_cores: usize,
}

impl SimulationBackend {
    pub fn new() -> Self {
        info!("Isolation backend initialized (simulation mode)");
        Self {
            next_pid: Arc::new(AtomicU32::new(FIRST_SIMULATED_PID)),
            killed: Arc::new(DashSet::new()),
            faults: Arc::new(Mutex::new(Faults::default())),
            live_contexts: Arc::new(AtomicUsize::new(0)),
            live_processes: Arc::new(AtomicUsize::new(0)),
            default_cores: DEFAULT_CORES,
        }
    }

    /// Cores given to containers that do not pin CPUs
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.default_cores = cores;
        self
    }

    /// Make `command` unresolvable
    pub fn with_missing_command(self, command: impl Into<String>) -> Self {
        self.faults.lock().missing_commands.insert(command.into());
        self
    }

    /// Reject every subsequent `prepare`
    pub fn reject_prepare(&self, reject: bool) {
        self.faults.lock().reject_prepare = reject;
    }

    /// Kill a simulated process behind the framework's back
    pub fn kill_process(&self, pid: HostPid) {
        info!("Simulated out-of-band death of PID {}", pid);
        self.killed.insert(pid);
    }

    /// Contexts prepared and not yet released
    pub fn live_contexts(&self) -> usize {
        self.live_contexts.load(Ordering::SeqCst)
    }

    /// Processes spawned and not yet reaped
    pub fn live_processes(&self) -> usize {
        self.live_processes.load(Ordering::SeqCst)
    }

    fn reap(&self, ctx: &mut SimContext) {
        if let Some(process) = ctx.process.take() {
            self.killed.remove(&process.pid);
            self.live_processes.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn core_usage(started: Instant, core: usize) -> Nanos {
        let elapsed = started.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
        elapsed / (core as u64 + 2)
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSpawner for SimulationBackend {
    type Context = SimContext;

    fn prepare(&self, request: &PrepareRequest<'_>) -> BackendResult<SimContext> {
        if self.faults.lock().reject_prepare {
            return Err(BackendError::InvalidConfig(
                "simulated configuration rejection".to_string(),
            ));
        }

        let cores = request
            .config
            .cpus
            .as_ref()
            .map_or(self.default_cores, Vec::len);

        self.live_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(SimContext {
            id: request.definition.id.clone(),
            config: request.config.clone(),
            cores,
            process: None,
        })
    }

    fn spawn(&self, ctx: &mut SimContext, request: &SpawnRequest<'_>) -> BackendResult<HostPid> {
        if self.is_alive(ctx) {
            return Err(BackendError::AlreadyRunning(ctx.live()?.pid));
        }
        if request.command.trim().is_empty()
            || self.faults.lock().missing_commands.contains(request.command)
        {
            return Err(BackendError::SpawnFailed(format!(
                "{}: command not found",
                request.command
            )));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        ctx.process = Some(SimProcess {
            pid,
            started: Instant::now(),
        });
        self.live_processes.fetch_add(1, Ordering::SeqCst);

        info!(
            "Spawned simulated '{}' in container {} (PID {})",
            request.command, ctx.id, pid
        );
        Ok(pid)
    }

    fn is_alive(&self, ctx: &mut SimContext) -> bool {
        match ctx.process.as_ref() {
            Some(process) if self.killed.contains(&process.pid) => {
                self.reap(ctx);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn pid(&self, ctx: &SimContext) -> Option<HostPid> {
        ctx.process.as_ref().map(|p| p.pid)
    }

    fn terminate(&self, ctx: &mut SimContext) -> BackendResult<()> {
        self.reap(ctx);
        Ok(())
    }

    fn release(&self, mut ctx: SimContext) -> BackendResult<()> {
        self.reap(&mut ctx);
        self.live_contexts.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ResourceAccounting for SimulationBackend {
    fn memory(&self, ctx: &SimContext) -> BackendResult<MemoryInfo> {
        let process = ctx.live()?;
        if self.killed.contains(&process.pid) {
            // Exited, not yet reaped
            return Err(BackendError::NotRunning);
        }
        Ok(SIMULATED_MEMORY)
    }

    fn cpu_cores(&self, ctx: &SimContext) -> BackendResult<usize> {
        Ok(ctx.cores)
    }

    fn cpu_usage(&self, ctx: &SimContext, core: CpuCore) -> BackendResult<Nanos> {
        let started = ctx.live()?.started;
        match core {
            CpuCore::All => Ok((0..ctx.cores)
                .map(|k| Self::core_usage(started, k))
                .sum()),
            CpuCore::Core(index) if (index as usize) < ctx.cores => {
                Ok(Self::core_usage(started, index as usize))
            }
            CpuCore::Core(index) => Err(BackendError::NoSuchCore {
                index,
                available: ctx.cores,
            }),
        }
    }
}

impl NetworkEnumerator for SimulationBackend {
    fn interfaces(&self, ctx: &SimContext) -> BackendResult<Vec<NetworkInterface>> {
        let pid = ctx.live()?.pid;
        let loopback = NetworkInterface::new("lo").with_ips(["127.0.0.1", "::1"]);

        match ctx.config.network {
            NetworkMode::None => Err(BackendError::NoNetworkNamespace),
            NetworkMode::Host => Ok(vec![
                loopback,
                NetworkInterface::new("eth0").with_ips(["192.168.1.10", "fe80::1"]),
                NetworkInterface::new("docker0"),
            ]),
            NetworkMode::Private => {
                let host_octet = pid % 250 + 2;
                Ok(vec![
                    loopback,
                    NetworkInterface::new("veth0").with_ips([format!("10.0.0.{}", host_octet)]),
                ])
            }
        }
    }
}

impl IsolationBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn is_concurrent(&self) -> bool {
        true
    }
}
