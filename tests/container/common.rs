/*!
 * Shared fixtures for container tests
 */

use process_containers::{Container, Framework, SimulationBackend};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A search path holding a `demo` definition, and a simulation framework
pub struct Fixture {
    pub dir: TempDir,
    pub framework: Framework<SimulationBackend>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_backend(SimulationBackend::new())
    }

    pub fn with_backend(backend: SimulationBackend) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("demo")).unwrap();
        Self {
            dir,
            framework: Framework::builder(backend).initialize(),
        }
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        vec![self.dir.path().to_path_buf()]
    }

    pub fn backend(&self) -> &SimulationBackend {
        self.framework.backend()
    }

    /// Add a definition directory, optionally with a config.json
    pub fn define(&self, id: &str, config: Option<&str>) {
        let root = self.dir.path().join(id);
        fs::create_dir_all(&root).unwrap();
        if let Some(config) = config {
            fs::write(root.join("config.json"), config).unwrap();
        }
    }

    pub fn create(&self, id: &str) -> Container {
        self.create_with(id, "")
    }

    pub fn create_with(&self, id: &str, config: &str) -> Container {
        self.framework
            .create(id, self.search_paths().as_slice(), None, config)
            .unwrap()
    }

    /// Created and started with a long-running command
    pub fn running(&self, id: &str, config: &str) -> Container {
        let handle = self.create_with(id, config);
        self.framework
            .start(&handle, "/bin/sleep", &["60"])
            .unwrap();
        handle
    }
}
