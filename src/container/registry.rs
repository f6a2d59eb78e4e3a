/*!
 * Container Registry
 * Live container instances keyed by never-reused handle keys
 */

use super::types::{Container, ContainerInfo, ContainerState};
use crate::backend::ContainerDefinition;
use crate::core::types::HostPid;
use crate::core::{ContainerError, ContainerResult, HandleAllocator, HandleKey};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Per-instance state; `C` is the backend's isolation context
#[derive(Debug)]
pub struct ContainerEntry<C> {
    pub id: String,
    pub definition: ContainerDefinition,
    pub state: ContainerState,
    context: Option<C>,
    pub log_file: Option<PathBuf>,
    pub pid: Option<HostPid>,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub start_count: u64,
}

impl<C> ContainerEntry<C> {
    pub fn new(definition: ContainerDefinition, context: C, log_file: Option<PathBuf>) -> Self {
        Self {
            id: definition.id.clone(),
            definition,
            state: ContainerState::Created,
            context: Some(context),
            log_file,
            pid: None,
            created_at: SystemTime::now(),
            started_at: None,
            start_count: 0,
        }
    }

    /// Backend context; fails once the entry was torn down by a racing destroy
    pub fn context(&self) -> ContainerResult<&C> {
        self.context.as_ref().ok_or_else(|| self.torn_down())
    }

    pub fn context_mut(&mut self) -> ContainerResult<&mut C> {
        match self.context {
            Some(ref mut context) => Ok(context),
            None => Err(ContainerError::invalid_key(format!(
                "container {} was destroyed",
                self.id
            ))),
        }
    }

    /// Take the context for release; the entry is dead afterwards
    pub fn take_context(&mut self) -> Option<C> {
        self.pid = None;
        self.context.take()
    }

    fn torn_down(&self) -> ContainerError {
        ContainerError::invalid_key(format!("container {} was destroyed", self.id))
    }

    pub fn mark_running(&mut self, pid: HostPid) {
        self.state = ContainerState::Running;
        self.pid = Some(pid);
        self.started_at = Some(SystemTime::now());
        self.start_count += 1;
    }

    pub fn mark_stopped(&mut self) {
        self.state = ContainerState::Stopped;
        self.pid = None;
    }

    pub fn info(&self, key: HandleKey) -> ContainerInfo {
        ContainerInfo {
            id: self.id.clone(),
            key,
            state: self.state,
            pid: self.pid,
            root: self.definition.root.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            start_count: self.start_count,
            log_file: self.log_file.clone(),
        }
    }
}

pub type SharedEntry<C> = Arc<Mutex<ContainerEntry<C>>>;

/// Concurrent registry of container entries
///
/// Lookups clone the entry's `Arc` out of the map, so no shard lock is held
/// while an entry is locked or the backend is called.
pub struct ContainerRegistry<C> {
    entries: DashMap<HandleKey, SharedEntry<C>, RandomState>,
    keys: HandleAllocator,
}

impl<C> ContainerRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            keys: HandleAllocator::new(),
        }
    }

    pub fn insert(&self, entry: ContainerEntry<C>) -> Container {
        let key = self.keys.next();
        let handle = Container::new(key, &entry.id);
        self.entries.insert(key, Arc::new(Mutex::new(entry)));
        handle
    }

    pub fn get(&self, handle: &Container) -> ContainerResult<SharedEntry<C>> {
        self.entries
            .get(&handle.key())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| stale(handle))
    }

    /// Unlink an entry; later lookups with any clone of the handle fail
    pub fn remove(&self, handle: &Container) -> ContainerResult<SharedEntry<C>> {
        self.entries
            .remove(&handle.key())
            .map(|(_, entry)| entry)
            .ok_or_else(|| stale(handle))
    }

    /// Unlink every entry
    pub fn drain(&self) -> Vec<(HandleKey, SharedEntry<C>)> {
        let keys: Vec<HandleKey> = self.entries.iter().map(|e| *e.key()).collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    /// Ids of registered containers, in creation order
    pub fn ids(&self) -> Vec<String> {
        let mut live: Vec<(HandleKey, SharedEntry<C>)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        live.sort_unstable_by_key(|(key, _)| *key);
        live.into_iter().map(|(_, entry)| entry.lock().id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys handed out over the registry's lifetime
    pub fn issued(&self) -> u64 {
        self.keys.issued()
    }
}

impl<C> Default for ContainerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn stale(handle: &Container) -> ContainerError {
    ContainerError::invalid_key(format!("container {} is not registered", handle))
}
