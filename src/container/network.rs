/*!
 * Network Status
 * Snapshots of the interfaces visible inside a container
 */

use super::types::{Container, NetworkStatus};
use crate::backend::IsolationBackend;
use crate::core::ContainerResult;
use crate::framework::Framework;
use crate::monitoring::span_operation;
use log::debug;

impl<B: IsolationBackend> Framework<B> {
    /// Enumerate interfaces and addresses in the container's network view
    ///
    /// The snapshot is owned by the caller; release it with
    /// [`network_status_destroy`](super::network_status_destroy) or drop it.
    pub fn network_status_create(&self, handle: &Container) -> ContainerResult<NetworkStatus> {
        span_operation("network_status", handle.id()).in_scope(|| {
            let interfaces = self.with_running(handle, |b, ctx| b.interfaces(ctx))?;
            debug!(
                "Container {} sees {} interface(s)",
                handle,
                interfaces.len()
            );
            Ok(NetworkStatus::new(interfaces))
        })
    }
}
