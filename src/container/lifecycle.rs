/*!
 * Container Lifecycle
 * create → start ⇄ stop → destroy
 *
 * `Created` and `Stopped` accept start and destroy; `Running` accepts stop
 * and destroy. A running container whose process died out of band is moved
 * to `Stopped` by the next live check.
 */

use super::config::ContainerConfig;
use super::registry::ContainerEntry;
use super::types::{Container, ContainerInfo, ContainerState};
use crate::backend::{IsolationBackend, PrepareRequest, SpawnRequest};
use crate::core::{ContainerError, ContainerResult};
use crate::framework::Framework;
use crate::monitoring::span_operation;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl<B: IsolationBackend> Framework<B> {
    /// Create a container from the first definition found on `search_paths`
    ///
    /// Nothing runs until `start`. `configuration` is a JSON blob; when it
    /// is empty the definition's `config.json` (if any) is used. With
    /// `log_path` set, captured output goes to `<log_path>/<id>.log`.
    pub fn create<P: AsRef<Path>>(
        &self,
        id: &str,
        search_paths: &[P],
        log_path: Option<&Path>,
        configuration: &str,
    ) -> ContainerResult<Container> {
        self.ensure_initialized()?;

        span_operation("create", id).in_scope(|| {
            let paths: Vec<PathBuf> = search_paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
            let definition = self
                .inner
                .resolver
                .resolve(id, &paths)
                .map_err(|e| ContainerError::unknown(e.to_string()))?;

            let config = ContainerConfig::load(&definition, configuration)
                .map_err(|e| ContainerError::unknown(format!("container {}: {}", id, e)))?;

            let log_file = match log_path {
                Some(dir) => {
                    fs::create_dir_all(dir).map_err(|e| {
                        ContainerError::unknown(format!("log directory {}: {}", dir.display(), e))
                    })?;
                    Some(dir.join(format!("{}.log", id)))
                }
                None => None,
            };

            // Last fallible step: the backend either returns a context or
            // holds nothing
            let context = self.inner.backend.with(|b| {
                b.prepare(&PrepareRequest {
                    definition: &definition,
                    config: &config,
                })
            })?;

            let root = definition.root.clone();
            let handle = self
                .inner
                .registry
                .insert(ContainerEntry::new(definition, context, log_file));

            // Lost a race with deinitialize: nobody would release it
            if !self.is_initialized() {
                if let Ok(entry) = self.inner.registry.remove(&handle) {
                    self.release_entry(&entry)?;
                }
                return Err(ContainerError::unknown("container framework is not initialized"));
            }

            info!("Created container {} from {}", handle, root.display());
            Ok(handle)
        })
    }

    /// Launch `command` with `params` inside the container
    ///
    /// On failure the container keeps its prior state.
    pub fn start<S: AsRef<str>>(
        &self,
        handle: &Container,
        command: &str,
        params: &[S],
    ) -> ContainerResult<()> {
        let entry = self.entry(handle)?;

        span_operation("start", handle.id()).in_scope(|| {
            let mut entry = entry.lock();
            if self.refresh(&mut entry)? {
                return Err(ContainerError::unknown(format!(
                    "container {} is already running",
                    handle
                )));
            }

            let args: Vec<String> = params.iter().map(|p| p.as_ref().to_string()).collect();
            let log_file = entry.log_file.clone();
            let context = entry.context_mut()?;

            let pid = self.inner.backend.with(|b| {
                b.spawn(
                    context,
                    &SpawnRequest {
                        command,
                        args: &args,
                        log_file: log_file.as_deref(),
                    },
                )
            })?;

            entry.mark_running(pid);
            info!("Started container {} (PID {})", handle, pid);
            Ok(())
        })
    }

    /// Terminate the contained process group
    ///
    /// Succeeds without effect when nothing is running.
    pub fn stop(&self, handle: &Container) -> ContainerResult<()> {
        let entry = self.entry(handle)?;

        span_operation("stop", handle.id())
            .with_slow_threshold(Duration::from_secs(1))
            .in_scope(|| {
                let mut entry = entry.lock();
                if entry.state != ContainerState::Running {
                    return Ok(());
                }

                let context = entry.context_mut()?;
                let terminated = self.inner.backend.with(|b| b.terminate(context));
                if let Err(e) = terminated {
                    let context = entry.context_mut()?;
                    if self.inner.backend.with(|b| b.is_alive(context)) {
                        return Err(e.into());
                    }
                    warn!("Container {} stopped with errors: {}", handle, e);
                }

                entry.mark_stopped();
                info!("Stopped container {}", handle);
                Ok(())
            })
    }

    /// Whether the container is running, checked against the OS
    ///
    /// Never fails: stale handles and torn-down frameworks report `false`.
    pub fn running(&self, handle: &Container) -> bool {
        let Ok(entry) = self.entry(handle) else {
            return false;
        };
        let mut entry = entry.lock();
        self.refresh(&mut entry).unwrap_or(false)
    }

    /// Stop the container if needed and release everything it holds
    ///
    /// Every clone of `handle` is stale afterwards.
    pub fn destroy(&self, handle: Container) -> ContainerResult<()> {
        self.ensure_initialized()?;

        span_operation("destroy", handle.id())
            .with_slow_threshold(Duration::from_secs(1))
            .in_scope(|| {
                // Unlink first so racing operations see a stale key
                let entry = self.inner.registry.remove(&handle)?;
                self.release_entry(&entry)?;
                info!("Destroyed container {}", handle);
                Ok(())
            })
    }

    /// Summary of the container's current state
    pub fn info(&self, handle: &Container) -> ContainerResult<ContainerInfo> {
        let entry = self.entry(handle)?;
        let mut entry = entry.lock();
        self.refresh(&mut entry)?;
        Ok(entry.info(handle.key()))
    }

    /// Ids of every live container, in creation order
    pub fn containers(&self) -> Vec<String> {
        if !self.is_initialized() {
            return Vec::new();
        }
        self.inner.registry.ids()
    }

    /// File receiving the container's captured output, if any
    pub fn log_file(&self, handle: &Container) -> ContainerResult<Option<PathBuf>> {
        let entry = self.entry(handle)?;
        let log_file = entry.lock().log_file.clone();
        Ok(log_file)
    }

    /// Live check for a locked entry; moves dead containers to `Stopped`
    pub(crate) fn refresh(&self, entry: &mut ContainerEntry<B::Context>) -> ContainerResult<bool> {
        if !entry.state.is_running() {
            return Ok(false);
        }

        let context = entry.context_mut()?;
        let alive = self.inner.backend.with(|b| b.is_alive(context));
        if !alive {
            info!(
                "Container {} process {:?} exited on its own",
                entry.id, entry.pid
            );
            entry.mark_stopped();
        }
        Ok(alive)
    }

    /// Run `f` against a running container's context
    pub(crate) fn with_running<R>(
        &self,
        handle: &Container,
        f: impl FnOnce(&B, &B::Context) -> crate::backend::BackendResult<R>,
    ) -> ContainerResult<R> {
        let entry = self.entry(handle)?;
        let mut entry = entry.lock();
        if !self.refresh(&mut entry)? {
            return Err(ContainerError::unknown(format!(
                "container {} is not running",
                handle
            )));
        }

        let context = entry.context()?;
        Ok(self.inner.backend.with(|b| f(b, context))?)
    }
}
