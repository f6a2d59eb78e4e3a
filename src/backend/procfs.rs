/*!
 * procfs Accounting
 * Parsers and readers for /proc/<pid>/{stat,statm,task}
 */

use super::types::{BackendError, BackendResult};
use crate::core::types::{HostPid, MemoryInfo, Nanos};
use std::fs;
use std::io;
use std::path::PathBuf;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Fields of interest from a `stat` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFields {
    /// Process id, or thread id for `task/<tid>/stat`
    pub pid: HostPid,
    pub state: char,
    /// Process group id
    pub pgrp: HostPid,
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
    /// CPU the task last ran on
    pub processor: Option<u32>,
}

impl StatFields {
    /// Own user + system ticks
    pub fn own_ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }

    /// Own ticks plus those of reaped children
    pub fn total_ticks(&self) -> u64 {
        self.own_ticks()
            .saturating_add(self.cutime)
            .saturating_add(self.cstime)
    }

    pub fn is_zombie(&self) -> bool {
        matches!(self.state, 'Z' | 'X')
    }
}

/// Parse a `/proc/<pid>/stat` line
///
/// Format: `pid (comm) state ppid ...`. `comm` may contain spaces and
/// parentheses, so fields are counted from the last `)`.
pub fn parse_stat(content: &str) -> Option<StatFields> {
    let lparen = content.find('(')?;
    let rparen = content.rfind(')')?;
    let pid = content[..lparen].trim().parse().ok()?;
    let fields: Vec<&str> = content[rparen + 1..].split_whitespace().collect();

    // fields[0] is field 3 (state) of proc(5)
    let field = |n: usize| fields.get(n - 3).copied();
    let number = |n: usize| -> Option<u64> {
        let raw = field(n)?;
        // cutime/cstime are signed in the kernel ABI
        raw.parse::<u64>()
            .ok()
            .or_else(|| raw.parse::<i64>().ok().map(|v| v.max(0) as u64))
    };

    Some(StatFields {
        pid,
        state: field(3)?.chars().next()?,
        pgrp: field(5)?.parse().ok()?,
        utime: number(14)?,
        stime: number(15)?,
        cutime: number(16)?,
        cstime: number(17)?,
        processor: field(39).and_then(|p| p.parse().ok()),
    })
}

/// Parse `/proc/<pid>/statm` into byte counts
pub fn parse_statm(content: &str, page_size: u64) -> Option<MemoryInfo> {
    let mut pages = content.split_whitespace().map(|v| v.parse::<u64>().ok());
    let size = pages.next()??;
    let resident = pages.next()??;
    let shared = pages.next()??;

    Some(MemoryInfo {
        allocated: size.saturating_mul(page_size),
        resident: resident.saturating_mul(page_size),
        shared: shared.saturating_mul(page_size),
    })
}

/// Convert clock ticks to nanoseconds
#[inline]
pub fn ticks_to_nanos(ticks: u64, ticks_per_sec: u64) -> Nanos {
    if ticks_per_sec == 0 {
        return 0;
    }
    let nanos = u128::from(ticks) * NANOS_PER_SEC / u128::from(ticks_per_sec);
    nanos.min(u128::from(u64::MAX)) as u64
}

/// Reader bound to a procfs mount point
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
    ticks_per_sec: u64,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>, page_size: u64, ticks_per_sec: u64) -> Self {
        Self {
            root: root.into(),
            page_size,
            ticks_per_sec,
        }
    }

    pub fn is_available(&self) -> bool {
        self.root.join("self/stat").exists()
    }

    pub fn ticks_per_sec(&self) -> u64 {
        self.ticks_per_sec
    }

    fn pid_dir(&self, pid: HostPid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read(&self, path: PathBuf) -> BackendResult<String> {
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BackendError::NotRunning,
            _ => BackendError::Io(e),
        })
    }

    pub fn stat(&self, pid: HostPid) -> BackendResult<StatFields> {
        let content = self.read(self.pid_dir(pid).join("stat"))?;
        parse_stat(&content)
            .ok_or_else(|| BackendError::Accounting(format!("unparsable stat for PID {}", pid)))
    }

    pub fn memory(&self, pid: HostPid) -> BackendResult<MemoryInfo> {
        let content = self.read(self.pid_dir(pid).join("statm"))?;
        parse_statm(&content, self.page_size)
            .ok_or_else(|| BackendError::Accounting(format!("unparsable statm for PID {}", pid)))
    }

    /// Stat lines of every thread of `pid`
    ///
    /// Threads that exit while the directory is walked are skipped.
    pub fn threads(&self, pid: HostPid) -> BackendResult<Vec<StatFields>> {
        let task_dir = self.pid_dir(pid).join("task");
        let entries = fs::read_dir(&task_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BackendError::NotRunning,
            _ => BackendError::Io(e),
        })?;

        let mut threads = Vec::new();
        for entry in entries.flatten() {
            let Ok(content) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some(fields) = parse_stat(&content) {
                threads.push(fields);
            }
        }
        Ok(threads)
    }

    pub fn to_nanos(&self, ticks: u64) -> Nanos {
        ticks_to_nanos(ticks, self.ticks_per_sec)
    }

    /// Live (non-zombie) processes whose process group is `pgid`
    pub fn group(&self, pgid: HostPid) -> BackendResult<Vec<HostPid>> {
        let mut members = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<HostPid>().ok()) else {
                continue;
            };
            // Processes exit while the directory is walked
            let Ok(content) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            match parse_stat(&content) {
                Some(stat) if stat.pgrp == pgid && !stat.is_zombie() => members.push(pid),
                _ => {}
            }
        }
        members.sort_unstable();
        Ok(members)
    }

    /// Memory summed over `pids`; vanished processes are skipped
    pub fn memory_of(&self, pids: &[HostPid]) -> MemoryInfo {
        pids.iter()
            .filter_map(|&pid| self.memory(pid).ok())
            .fold(MemoryInfo::default(), |sum, mem| MemoryInfo {
                allocated: sum.allocated.saturating_add(mem.allocated),
                resident: sum.resident.saturating_add(mem.resident),
                shared: sum.shared.saturating_add(mem.shared),
            })
    }

    /// Threads of every process in `pids`
    pub fn threads_of(&self, pids: &[HostPid]) -> Vec<StatFields> {
        pids.iter()
            .filter_map(|&pid| self.threads(pid).ok())
            .flatten()
            .collect()
    }
}
