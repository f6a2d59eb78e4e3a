/*!
 * Host Backend
 * Linux isolation using process groups, namespaces, cgroups and procfs
 *
 * Accounting covers every member of the container: the process group of
 * the spawned process plus anything in its cgroup. The cgroup's own
 * counters are used when readable, procfs sums otherwise.
 */

use super::cgroup::{Cgroup, CgroupManager};
use super::ledger::CpuLedger;
use super::netns;
use super::procfs::ProcFs;
use super::traits::*;
use super::types::*;
use crate::container::config::{ContainerConfig, NetworkMode};
use crate::core::types::{CpuCore, HostPid, MemoryInfo, Nanos, NetworkInterface};
use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::sched::{sched_getaffinity, sched_setaffinity, unshare, CloneFlags, CpuSet};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{sysconf, Pid, SysconfVar};
use parking_lot::{Mutex, MutexGuard};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const REAP_POLL: Duration = Duration::from_millis(10);

/// Isolation state of one container on the host
#[derive(Debug)]
pub struct HostContext {
    id: String,
    root: PathBuf,
    config: ContainerConfig,
    cgroup: Option<Cgroup>,
    child: Option<Child>,
    /// Per-CPU counters of the current run
    cpu: Mutex<CpuLedger>,
}

impl HostContext {
    fn running_pid(&self) -> BackendResult<HostPid> {
        self.child
            .as_ref()
            .map(Child::id)
            .ok_or(BackendError::NotRunning)
    }
}

impl Drop for HostContext {
    fn drop(&mut self) {
        // Contexts dropped without release must not leave processes behind
        if let Some(mut child) = self.child.take() {
            warn!("Container {} dropped while running; killing PID {}", self.id, child.id());
            signal_group(child.id(), Signal::SIGKILL);
            let _ = child.wait();
        }
    }
}

/// Linux host backend
#[derive(Debug, Clone)]
pub struct HostBackend {
    procfs: ProcFs,
    cgroups: CgroupManager,
}

impl HostBackend {
    pub fn new() -> BackendResult<Self> {
        let page_size = sysconf(SysconfVar::PAGE_SIZE)?.unwrap_or(4096) as u64;
        let ticks = sysconf(SysconfVar::CLK_TCK)?.unwrap_or(100) as u64;
        let procfs = ProcFs::new("/proc", page_size, ticks);

        if !procfs.is_available() {
            return Err(BackendError::PlatformNotSupported(
                "/proc is not mounted".to_string(),
            ));
        }

        info!(
            "Host backend initialized (page size {}, {} ticks/s)",
            page_size, ticks
        );
        Ok(Self {
            procfs,
            cgroups: CgroupManager::new(),
        })
    }

    /// Place container cgroups under a different hierarchy
    pub fn with_cgroups(mut self, cgroups: CgroupManager) -> Self {
        self.cgroups = cgroups;
        self
    }

    /// Host CPUs the container may run on, in ascending order
    fn allowed_cpus(&self, ctx: &HostContext) -> BackendResult<Vec<usize>> {
        let target = match ctx.child.as_ref() {
            Some(child) => Pid::from_raw(child.id() as i32),
            None => {
                if let Some(ref cpus) = ctx.config.cpus {
                    let mut cpus = cpus.clone();
                    cpus.sort_unstable();
                    return Ok(cpus);
                }
                Pid::from_raw(0)
            }
        };
        let set = sched_getaffinity(target).map_err(|e| match e {
            Errno::ESRCH => BackendError::NotRunning,
            other => BackendError::Os(other),
        })?;
        Ok(cpu_list(&set))
    }

    fn validate_cpus(&self, cpus: &[usize]) -> BackendResult<()> {
        let host = cpu_list(&sched_getaffinity(Pid::from_raw(0))?);
        if let Some(missing) = cpus.iter().find(|c| !host.contains(c)) {
            return Err(BackendError::InvalidConfig(format!(
                "CPU {} is not available to this host process",
                missing
            )));
        }
        Ok(())
    }

    /// Fail when the process is gone or a zombie awaiting reap
    fn live_pid(&self, ctx: &HostContext) -> BackendResult<HostPid> {
        let pid = ctx.running_pid()?;
        if self.procfs.stat(pid)?.is_zombie() {
            return Err(BackendError::NotRunning);
        }
        Ok(pid)
    }

    /// Every live process of the container
    ///
    /// The spawned process leads its own group; members that left the
    /// group are still found through the cgroup.
    fn members(&self, ctx: &HostContext) -> BackendResult<Vec<HostPid>> {
        let pid = self.live_pid(ctx)?;
        let mut members = self.procfs.group(pid)?;
        members.push(pid);
        if let Some(ref cgroup) = ctx.cgroup {
            members.extend(cgroup.procs());
        }
        members.sort_unstable();
        members.dedup();
        Ok(members)
    }

    /// Charge every member thread's new ticks to its current CPU
    fn sample_cpu<'c>(
        &self,
        ctx: &'c HostContext,
        members: &[HostPid],
    ) -> MutexGuard<'c, CpuLedger> {
        let tasks = self.procfs.threads_of(members);
        let mut ledger = ctx.cpu.lock();
        ledger.record(&tasks);
        ledger
    }
}

fn cpu_list(set: &CpuSet) -> Vec<usize> {
    (0..CpuSet::count())
        .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
        .collect()
}

/// Signal a whole process group; a vanished group is not an error
fn signal_group(pgid: HostPid, signal: Signal) {
    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to send {} to process group {}: {}", signal, pgid, e),
    }
}

impl ProcessSpawner for HostBackend {
    type Context = HostContext;

    fn prepare(&self, request: &PrepareRequest<'_>) -> BackendResult<HostContext> {
        let definition = request.definition;
        let config = request.config;

        if let Some(ref cpus) = config.cpus {
            self.validate_cpus(cpus)?;
        }

        if let Some(dir) = config.resolve_working_dir(&definition.root) {
            if !dir.is_dir() {
                return Err(BackendError::InvalidConfig(format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        // Last fallible step, so nothing needs undoing on error
        let cgroup_name = format!("{}-{}", definition.id, Uuid::new_v4().simple());
        let cgroup = self.cgroups.create(&cgroup_name, &config.limits);

        debug!(
            "Prepared host context for {} at {}",
            definition.id,
            definition.root.display()
        );
        Ok(HostContext {
            id: definition.id.clone(),
            root: definition.root.clone(),
            config: config.clone(),
            cgroup,
            child: None,
            cpu: Mutex::new(CpuLedger::new()),
        })
    }

    fn spawn(&self, ctx: &mut HostContext, request: &SpawnRequest<'_>) -> BackendResult<HostPid> {
        if self.is_alive(ctx) {
            return Err(BackendError::AlreadyRunning(ctx.running_pid()?));
        }
        if request.command.trim().is_empty() {
            return Err(BackendError::SpawnFailed("empty command".to_string()));
        }

        let mut cmd = Command::new(request.command);
        cmd.args(request.args);

        // Clean environment; PATH is always present for command lookup
        cmd.env_clear();
        cmd.env("PATH", DEFAULT_PATH);
        cmd.envs(&ctx.config.env);

        let working_dir = ctx
            .config
            .resolve_working_dir(&ctx.root)
            .unwrap_or_else(|| ctx.root.clone());
        cmd.current_dir(working_dir);

        cmd.stdin(Stdio::null());
        match request.log_file {
            Some(path) if ctx.config.capture_output => {
                let log = OpenOptions::new().create(true).append(true).open(path)?;
                cmd.stdout(log.try_clone()?).stderr(log);
            }
            _ => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        // Own process group, so stop can reach every descendant
        cmd.process_group(0);

        let private_net = ctx.config.network == NetworkMode::Private;
        let affinity = match ctx.config.cpus {
            Some(ref cpus) => {
                let mut set = CpuSet::new();
                for &cpu in cpus {
                    set.set(cpu)?;
                }
                Some(set)
            }
            None => None,
        };

        // SAFETY: the hook only issues async-signal-safe syscalls
        // (unshare, sched_setaffinity) and performs no allocation.
        unsafe {
            cmd.pre_exec(move || {
                if private_net {
                    unshare(CloneFlags::CLONE_NEWNET).map_err(io::Error::from)?;
                }
                if let Some(ref set) = affinity {
                    sched_setaffinity(Pid::from_raw(0), set).map_err(io::Error::from)?;
                }
                Ok(())
            });
        }

        // The cgroup outlives runs; only time charged from here on counts
        let charged = ctx.cgroup.as_ref().and_then(Cgroup::cpu_usage).unwrap_or(0);

        let child = cmd
            .spawn()
            .map_err(|e| BackendError::SpawnFailed(format!("{}: {}", request.command, e)))?;
        let pid = child.id();

        if let Some(ref cgroup) = ctx.cgroup {
            cgroup.attach(pid);
        }

        info!(
            "Spawned '{}' in container {} (host PID {})",
            request.command, ctx.id, pid
        );
        ctx.child = Some(child);
        *ctx.cpu.get_mut() = CpuLedger::with_baseline(charged);
        Ok(pid)
    }

    fn is_alive(&self, ctx: &mut HostContext) -> bool {
        let Some(child) = ctx.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                let pid = child.id();
                info!(
                    "Container {} process (PID {}) exited with {:?}",
                    ctx.id,
                    pid,
                    status.code()
                );
                // Sweep anything the main process left in its group
                signal_group(pid, Signal::SIGKILL);
                ctx.child = None;
                false
            }
            Err(e) => {
                // Unknown state: make sure nothing outlives the handle
                let pid = child.id();
                error!(
                    "Error checking container {} process (PID {}): {}; killing its group",
                    ctx.id, pid, e
                );
                signal_group(pid, Signal::SIGKILL);
                let _ = child.wait();
                ctx.child = None;
                false
            }
        }
    }

    fn pid(&self, ctx: &HostContext) -> Option<HostPid> {
        ctx.child.as_ref().map(Child::id)
    }

    fn terminate(&self, ctx: &mut HostContext) -> BackendResult<()> {
        let Some(mut child) = ctx.child.take() else {
            return Ok(());
        };
        let pid = child.id();

        signal_group(pid, Signal::SIGTERM);

        let deadline = Instant::now() + Duration::from_millis(ctx.config.stop_timeout_ms);
        let status = loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(e) => {
                    // Cannot tell whether SIGTERM was honoured
                    warn!(
                        "Cannot poll container {} (PID {}): {}; sending SIGKILL",
                        ctx.id, pid, e
                    );
                    signal_group(pid, Signal::SIGKILL);
                    let _ = child.wait();
                    return Err(e.into());
                }
            };
            match polled {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    warn!(
                        "Container {} (PID {}) ignored SIGTERM, sending SIGKILL",
                        ctx.id, pid
                    );
                    signal_group(pid, Signal::SIGKILL);
                    break child.wait()?;
                }
                None => thread::sleep(REAP_POLL),
            }
        };

        signal_group(pid, Signal::SIGKILL);
        info!(
            "Stopped container {} (PID {}, exit {:?})",
            ctx.id,
            pid,
            status.code()
        );
        Ok(())
    }

    fn release(&self, mut ctx: HostContext) -> BackendResult<()> {
        let result = self.terminate(&mut ctx);
        if let Some(cgroup) = ctx.cgroup.take() {
            cgroup.remove();
        }
        debug!("Released host context for {}", ctx.id);
        result
    }
}

impl ResourceAccounting for HostBackend {
    fn memory(&self, ctx: &HostContext) -> BackendResult<MemoryInfo> {
        let members = self.members(ctx)?;
        let mut memory = self.procfs.memory_of(&members);

        if let Some(charged) = ctx.cgroup.as_ref().and_then(Cgroup::memory_current) {
            memory.resident = charged;
            memory.allocated = memory.allocated.max(charged);
            memory.shared = memory.shared.min(charged);
        }
        Ok(memory)
    }

    fn cpu_cores(&self, ctx: &HostContext) -> BackendResult<usize> {
        Ok(self.allowed_cpus(ctx)?.len())
    }

    fn cpu_usage(&self, ctx: &HostContext, core: CpuCore) -> BackendResult<Nanos> {
        match core {
            CpuCore::All => {
                let members = self.members(ctx)?;
                let mut ledger = self.sample_cpu(ctx, &members);

                // Reaped children only show up in their parent's totals
                let snapshot: u64 = members
                    .iter()
                    .filter_map(|&pid| self.procfs.stat(pid).ok())
                    .map(|stat| stat.total_ticks())
                    .sum();
                let sampled = self.procfs.to_nanos(ledger.total_ticks().max(snapshot));
                let charged = ctx
                    .cgroup
                    .as_ref()
                    .and_then(Cgroup::cpu_usage)
                    .map_or(0, |ns| ledger.since_start(ns));
                Ok(ledger.aggregate(sampled.max(charged)))
            }
            CpuCore::Core(index) => {
                let cpus = self.allowed_cpus(ctx)?;
                let cpu = *cpus.get(index as usize).ok_or(BackendError::NoSuchCore {
                    index,
                    available: cpus.len(),
                })?;

                let members = self.members(ctx)?;
                let ledger = self.sample_cpu(ctx, &members);
                Ok(self.procfs.to_nanos(ledger.cpu_ticks(cpu as u32)))
            }
        }
    }
}

impl NetworkEnumerator for HostBackend {
    fn interfaces(&self, ctx: &HostContext) -> BackendResult<Vec<NetworkInterface>> {
        if ctx.config.network == NetworkMode::None {
            return Err(BackendError::NoNetworkNamespace);
        }
        let pid = self.live_pid(ctx)?;
        netns::interfaces_of(pid)
    }
}

impl IsolationBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn is_concurrent(&self) -> bool {
        // Contexts share no mutable state
        true
    }
}
