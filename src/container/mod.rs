/*!
 * Containers
 * Lifecycle, resource monitoring and network snapshots of isolated processes
 */

pub mod config;
mod lifecycle;
mod monitor;
mod network;
pub mod registry;
pub mod resolver;
pub mod types;

pub use config::{ConfigError, ContainerConfig, NetworkMode, ResourceLimits};
pub use resolver::{DefinitionResolver, ResolveError, SearchPathResolver};
pub use types::{network_status_destroy, Container, ContainerInfo, ContainerState, NetworkStatus};
