/*!
 * Isolation Backends
 * Platform mechanisms the container core delegates to
 *
 * The core never touches namespaces, cgroups or procfs directly; it drives a
 * backend through the capability traits below:
 * - `HostBackend`: Linux process groups, netns, cgroup v2, procfs
 * - `SimulationBackend`: in-memory, for unprivileged environments and tests
 */

pub mod cgroup;
pub mod gate;
#[cfg(target_os = "linux")]
pub mod host;
pub mod ledger;
#[cfg(target_os = "linux")]
pub mod netns;
pub mod procfs;
pub mod simulation;
pub mod traits;
pub mod types;

pub use gate::BackendGate;
#[cfg(target_os = "linux")]
pub use host::{HostBackend, HostContext};
pub use simulation::{SimContext, SimulationBackend};
pub use traits::{IsolationBackend, NetworkEnumerator, ProcessSpawner, ResourceAccounting};
pub use types::{BackendError, BackendResult, ContainerDefinition, PrepareRequest, SpawnRequest};
