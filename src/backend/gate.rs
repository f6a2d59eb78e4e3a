/*!
 * Backend Gate
 * Arbitrates access to a backend shared by every container handle
 */

use super::traits::IsolationBackend;
use parking_lot::Mutex;

/// Wraps a backend and serializes calls unless the backend is concurrent
pub struct BackendGate<B> {
    backend: B,
    serial: Option<Mutex<()>>,
}

impl<B: IsolationBackend> BackendGate<B> {
    pub fn new(backend: B) -> Self {
        let serial = if backend.is_concurrent() {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self { backend, serial }
    }

    /// Run `f` with exclusive access when the backend requires it
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        match &self.serial {
            Some(lock) => {
                let _guard = lock.lock();
                f(&self.backend)
            }
            None => f(&self.backend),
        }
    }

    /// Direct access for calls that need no arbitration (name, flags)
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_serialized(&self) -> bool {
        self.serial.is_some()
    }
}
