/*!
 * Network Namespace Probe
 * Enumerates interfaces and addresses inside another process's network namespace
 */

use super::types::{BackendError, BackendResult};
use crate::core::types::{HostPid, NetworkInterface};
use log::debug;
use nix::ifaddrs::getifaddrs;
use nix::sched::{setns, CloneFlags};
use nix::sys::socket::SockaddrStorage;
use std::fs::{self, File};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::thread;

fn netns_path(pid: &str) -> PathBuf {
    PathBuf::from("/proc").join(pid).join("ns/net")
}

/// Whether `pid` lives in the caller's network namespace
pub fn shares_caller_namespace(pid: HostPid) -> BackendResult<bool> {
    let own = fs::metadata(netns_path("self"))?;
    let theirs = fs::metadata(netns_path(&pid.to_string())).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BackendError::NotRunning,
        _ => BackendError::Io(e),
    })?;
    Ok(own.dev() == theirs.dev() && own.ino() == theirs.ino())
}

/// Interfaces visible to `pid`, in kernel enumeration order
///
/// A foreign namespace is entered from a short-lived helper thread so the
/// caller's threads never change namespace.
pub fn interfaces_of(pid: HostPid) -> BackendResult<Vec<NetworkInterface>> {
    if shares_caller_namespace(pid)? {
        return enumerate();
    }

    let ns = File::open(netns_path(&pid.to_string()))?;
    thread::scope(|scope| {
        let probe = thread::Builder::new()
            .name("netns-probe".into())
            .spawn_scoped(scope, || {
                setns(&ns, CloneFlags::CLONE_NEWNET)?;
                debug!("Entered network namespace of PID {}", pid);
                enumerate()
            })?;
        probe
            .join()
            .map_err(|_| BackendError::Accounting("network probe thread panicked".into()))?
    })
}

/// Interfaces of the current thread's namespace
pub fn enumerate() -> BackendResult<Vec<NetworkInterface>> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for ifaddr in getifaddrs()? {
        let slot = match interfaces
            .iter()
            .position(|iface| iface.name == ifaddr.interface_name)
        {
            Some(slot) => slot,
            None => {
                interfaces.push(NetworkInterface::new(ifaddr.interface_name.clone()));
                interfaces.len() - 1
            }
        };

        if let Some(ip) = ifaddr.address.as_ref().and_then(address_string) {
            let ips = &mut interfaces[slot].ips;
            if !ips.contains(&ip) {
                ips.push(ip);
            }
        }
    }

    Ok(interfaces)
}

fn address_string(addr: &SockaddrStorage) -> Option<String> {
    if let Some(v4) = addr.as_sockaddr_in() {
        return Some(Ipv4Addr::from(v4.ip()).to_string());
    }
    addr.as_sockaddr_in6()
        .map(|v6| Ipv6Addr::from(v6.ip()).to_string())
}
