/*!
 * Handle Keys
 * Registry keys for container handles
 *
 * Keys come from a monotonic counter and are never recycled, so a key held
 * after its container was destroyed can never alias a newer container.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry key of one container instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleKey(u64);

impl HandleKey {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Atomic key allocator
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Lock-free
#[repr(C, align(64))]
#[derive(Debug)]
pub struct HandleAllocator {
    counter: AtomicU64,
}

impl HandleAllocator {
    /// Create new allocator starting at 1
    #[inline]
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    #[inline]
    pub fn next(&self) -> HandleKey {
        HandleKey(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of keys handed out so far
    #[inline]
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed) - 1
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
