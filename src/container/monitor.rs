/*!
 * Resource Monitor
 * Point-in-time memory, CPU and pid queries for running containers
 *
 * Values are read fresh from the backend on every call; nothing is cached.
 */

use super::types::Container;
use crate::backend::{BackendError, IsolationBackend};
use crate::core::types::{CpuCore, HostPid, MemoryInfo, Nanos};
use crate::core::{ContainerError, ContainerResult};
use crate::framework::Framework;

impl<B: IsolationBackend> Framework<B> {
    /// Memory usage of the contained process
    pub fn memory_status(&self, handle: &Container) -> ContainerResult<MemoryInfo> {
        self.with_running(handle, |b, ctx| b.memory(ctx))
    }

    /// Number of execution units allocated to the container
    pub fn cpu_cores(&self, handle: &Container) -> ContainerResult<usize> {
        self.with_running(handle, |b, ctx| b.cpu_cores(ctx))
    }

    /// CPU time in nanoseconds
    ///
    /// `core_index` -1 selects the aggregate over all units; `k >= 0`
    /// selects the k-th allocated unit.
    pub fn cpu_usage(&self, handle: &Container, core_index: i32) -> ContainerResult<Nanos> {
        self.with_running(handle, |b, ctx| {
            let core = match CpuCore::try_from(core_index) {
                Ok(core) => core,
                Err(_) => {
                    return Err(BackendError::NoSuchCore {
                        index: core_index.unsigned_abs(),
                        available: b.cpu_cores(ctx)?,
                    })
                }
            };
            b.cpu_usage(ctx, core)
        })
        .map_err(|e| match e {
            // Report the index the caller passed, negative or not
            ContainerError::OutOfBounds { available, .. } => ContainerError::OutOfBounds {
                index: i64::from(core_index),
                available,
            },
            other => other,
        })
    }

    /// Per-unit CPU time written into `out`
    ///
    /// Returns the number of units filled. When `out` is shorter than the
    /// unit count it is left untouched and `MoreDataAvailable` reports the
    /// length needed.
    pub fn cpu_usage_per_core(&self, handle: &Container, out: &mut [u64]) -> ContainerResult<usize> {
        let usage = self.with_running(handle, |b, ctx| {
            let cores = b.cpu_cores(ctx)?;
            if cores > out.len() {
                return Ok(Err(cores));
            }
            (0..cores as u32)
                .map(|k| b.cpu_usage(ctx, CpuCore::Core(k)))
                .collect::<Result<Vec<_>, _>>()
                .map(Ok)
        })?;

        match usage {
            Ok(values) => {
                out[..values.len()].copy_from_slice(&values);
                Ok(values.len())
            }
            Err(required) => Err(ContainerError::MoreDataAvailable {
                required,
                provided: out.len(),
            }),
        }
    }

    /// Host pid of the contained process
    pub fn pid(&self, handle: &Container) -> ContainerResult<HostPid> {
        self.with_running(handle, |b, ctx| b.pid(ctx).ok_or(BackendError::NotRunning))
    }
}
