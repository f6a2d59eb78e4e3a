/*!
 * CPU Ledger
 * Monotonic per-CPU accounting from repeated task samples
 *
 * procfs only reports where a task ran last, not where its time was spent.
 * Each sample charges the ticks a task gained since the previous sample to
 * the CPU it is on now, so counters only ever grow and their sum never
 * exceeds the total.
 */

use super::procfs::StatFields;
use crate::core::types::{HostPid, Nanos};
use ahash::AHashMap;

#[derive(Debug, Default)]
pub struct CpuLedger {
    /// Own ticks of each task at the previous sample, by tid
    last: AHashMap<HostPid, u64>,
    per_cpu: AHashMap<u32, u64>,
    total: u64,
    /// Externally charged time that predates this run
    baseline: Nanos,
    /// Highest aggregate handed out
    reported: Nanos,
}

impl CpuLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger for a run whose external counter already reads `charged`
    pub fn with_baseline(charged: Nanos) -> Self {
        Self {
            baseline: charged,
            ..Self::default()
        }
    }

    /// Portion of an external counter reading accrued during this run
    pub fn since_start(&self, charged: Nanos) -> Nanos {
        charged.saturating_sub(self.baseline)
    }

    /// Charge the ticks gained since the previous sample
    ///
    /// Tasks missing from `tasks` are forgotten; time they used after the
    /// previous sample is lost.
    pub fn record(&mut self, tasks: &[StatFields]) {
        let mut seen = AHashMap::with_capacity(tasks.len());
        for task in tasks {
            let ticks = task.own_ticks();
            let before = self.last.get(&task.pid).copied().unwrap_or(0);
            // A recycled tid restarts from zero
            let gained = ticks.saturating_sub(before);

            if gained > 0 {
                if let Some(cpu) = task.processor {
                    let counter = self.per_cpu.entry(cpu).or_insert(0);
                    *counter = counter.saturating_add(gained);
                }
                self.total = self.total.saturating_add(gained);
            }
            seen.insert(task.pid, ticks);
        }
        self.last = seen;
    }

    /// Ticks charged to host CPU `cpu`
    pub fn cpu_ticks(&self, cpu: u32) -> u64 {
        self.per_cpu.get(&cpu).copied().unwrap_or(0)
    }

    /// Ticks charged across every CPU
    pub fn total_ticks(&self) -> u64 {
        self.total
    }

    /// Aggregate that never goes backwards
    ///
    /// `candidate` comes from sources that may shrink (exited tasks, a
    /// coarser clock); the result is the highest value seen so far.
    pub fn aggregate(&mut self, candidate: Nanos) -> Nanos {
        self.reported = self.reported.max(candidate);
        self.reported
    }
}
