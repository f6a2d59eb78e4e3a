/*!
 * Process Containers
 * Host-side lifecycle management and introspection of isolated process groups
 *
 * A `Framework` context owns the isolation backend and the registry of live
 * containers. Containers are created from definitions found on search
 * paths, started with an arbitrary command, monitored (memory, CPU, pid,
 * network interfaces) and destroyed, with every failure reported as one of
 * a closed set of error codes.
 */

pub mod backend;
pub mod container;
pub mod core;
pub mod framework;
pub mod monitoring;

// Re-exports
pub use backend::{IsolationBackend, SimulationBackend};
#[cfg(target_os = "linux")]
pub use backend::HostBackend;
pub use container::{
    network_status_destroy, Container, ContainerConfig, ContainerInfo, ContainerState, NetworkMode,
    NetworkStatus, ResourceLimits,
};
pub use core::{ContainerError, ContainerResult, CpuCore, ErrorCode, MemoryInfo, NetworkInterface};
pub use framework::{configure_logging, Framework, FrameworkBuilder};
#[cfg(target_os = "linux")]
pub use framework::HostFramework;
