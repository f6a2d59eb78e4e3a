/*!
 * Framework Context Tests
 * Initialization, independence of contexts and teardown
 */

use process_containers::container::{DefinitionResolver, ResolveError};
use process_containers::backend::ContainerDefinition;
use process_containers::{ErrorCode, Framework, SimulationBackend};
use std::path::PathBuf;

/// Resolves every id to a fixed directory
struct FixedResolver(PathBuf);

impl DefinitionResolver for FixedResolver {
    fn resolve(&self, id: &str, _search_paths: &[PathBuf]) -> Result<ContainerDefinition, ResolveError> {
        Ok(ContainerDefinition::new(id, self.0.join(id), self.0.clone()))
    }
}

#[test]
fn test_contexts_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = || FixedResolver(dir.path().to_path_buf());

    let a = Framework::builder(SimulationBackend::new())
        .with_resolver(resolver())
        .initialize();
    let b = Framework::builder(SimulationBackend::new())
        .with_resolver(resolver())
        .initialize();

    let no_paths: &[PathBuf] = &[];
    let handle = a.create("demo", no_paths, None, "").unwrap();
    assert_eq!(a.containers(), vec!["demo".to_string()]);
    assert!(b.containers().is_empty());

    // Handles belong to the context that issued them
    assert_eq!(b.info(&handle).unwrap_err().code(), ErrorCode::InvalidKey);

    b.deinitialize();
    assert!(a.is_initialized());
    a.start(&handle, "/bin/sleep", &["60"]).unwrap();
    assert!(a.running(&handle));
    a.deinitialize();
}

#[test]
fn test_deinitialize_twice_through_clones() {
    let framework = Framework::builder(SimulationBackend::new()).initialize();
    let clone = framework.clone();

    framework.deinitialize();
    clone.clone().deinitialize();
    assert!(!clone.is_initialized());
}

#[test]
fn test_debug_names_backend() {
    let framework = Framework::builder(SimulationBackend::new()).initialize();
    let debug = format!("{:?}", framework);
    assert!(debug.contains("simulation"), "{}", debug);
}
