/*!
 * Container Lifecycle Tests
 * create / start / stop / running / destroy against the simulation backend
 */

use super::common::Fixture;
use pretty_assertions::assert_eq;
use process_containers::backend::simulation::SIMULATED_MEMORY;
use process_containers::{ContainerState, ErrorCode, Framework, SimulationBackend};

const NO_ARGS: &[&str] = &[];

#[test]
fn test_created_container_is_not_running() {
    let fx = Fixture::new();
    let handle = fx.create("demo");

    assert!(!fx.framework.running(&handle));
    assert_eq!(handle.id(), "demo");

    let info = fx.framework.info(&handle).unwrap();
    assert_eq!(info.state, ContainerState::Created);
    assert_eq!(info.pid, None);
    assert_eq!(info.root, fx.dir.path().join("demo"));

    assert_eq!(fx.framework.pid(&handle).unwrap_err().code(), ErrorCode::Unknown);
    assert_eq!(fx.backend().live_processes(), 0);
}

#[test]
fn test_demo_runs_true() {
    let fx = Fixture::new();
    let handle = fx
        .framework
        .create("demo", &["/nonexistent".into(), fx.dir.path().to_path_buf()][..], None, "")
        .unwrap();

    fx.framework.start(&handle, "/bin/true", NO_ARGS).unwrap();
    assert!(fx.framework.running(&handle));

    let pid = fx.framework.pid(&handle).unwrap();
    assert!(pid > 0);

    let memory = fx.framework.memory_status(&handle).unwrap();
    assert!(memory.resident <= memory.allocated);
    assert_eq!(memory, SIMULATED_MEMORY);

    fx.framework.destroy(handle).unwrap();
}

#[test]
fn test_start_while_running_fails_and_keeps_state() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    let pid = fx.framework.pid(&handle).unwrap();

    let err = fx.framework.start(&handle, "/bin/sleep", &["1"]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);

    assert!(fx.framework.running(&handle));
    assert_eq!(fx.framework.pid(&handle).unwrap(), pid);
    assert_eq!(fx.backend().live_processes(), 1);
}

#[test]
fn test_stop_is_idempotent() {
    let fx = Fixture::new();
    let handle = fx.create("demo");

    // Never started
    fx.framework.stop(&handle).unwrap();
    assert_eq!(fx.framework.info(&handle).unwrap().state, ContainerState::Created);

    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();
    fx.framework.stop(&handle).unwrap();
    fx.framework.stop(&handle).unwrap();

    assert!(!fx.framework.running(&handle));
    assert_eq!(fx.framework.info(&handle).unwrap().state, ContainerState::Stopped);
    assert_eq!(fx.backend().live_processes(), 0);
}

#[test]
fn test_restart_after_stop() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    let first = fx.framework.pid(&handle).unwrap();

    fx.framework.stop(&handle).unwrap();
    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();

    let second = fx.framework.pid(&handle).unwrap();
    assert_ne!(first, second);

    let info = fx.framework.info(&handle).unwrap();
    assert_eq!(info.state, ContainerState::Running);
    assert_eq!(info.start_count, 2);
    assert!(info.started_at.is_some());
}

#[test]
fn test_out_of_band_death_moves_to_stopped() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    let pid = fx.framework.pid(&handle).unwrap();

    fx.backend().kill_process(pid);

    assert!(!fx.framework.running(&handle));
    assert_eq!(fx.framework.info(&handle).unwrap().state, ContainerState::Stopped);
    assert_eq!(
        fx.framework.memory_status(&handle).unwrap_err().code(),
        ErrorCode::Unknown
    );
    assert_eq!(fx.backend().live_processes(), 0);

    // A dead container can be started again without an explicit stop
    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();
    assert!(fx.framework.running(&handle));
}

#[test]
fn test_destroy_running_container() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    let stale = handle.clone();

    fx.framework.destroy(handle).unwrap();

    assert!(!fx.framework.running(&stale));
    assert_eq!(fx.framework.pid(&stale).unwrap_err().code(), ErrorCode::InvalidKey);
    assert_eq!(fx.framework.stop(&stale).unwrap_err().code(), ErrorCode::InvalidKey);
    assert_eq!(
        fx.framework.start(&stale, "/bin/true", NO_ARGS).unwrap_err().code(),
        ErrorCode::InvalidKey
    );
    assert_eq!(fx.framework.destroy(stale).unwrap_err().code(), ErrorCode::InvalidKey);

    assert_eq!(fx.backend().live_processes(), 0);
    assert_eq!(fx.backend().live_contexts(), 0);
}

#[test]
fn test_same_id_twice_gives_distinct_handles() {
    let fx = Fixture::new();
    let first = fx.create("demo");
    let second = fx.create("demo");
    assert_ne!(first, second);

    fx.framework.destroy(first.clone()).unwrap();
    assert_eq!(fx.framework.info(&first).unwrap_err().code(), ErrorCode::InvalidKey);
    assert_eq!(fx.framework.info(&second).unwrap().id, "demo");
}

#[test]
fn test_create_failures_are_unknown_and_leak_nothing() {
    let fx = Fixture::new();
    let paths = fx.search_paths();

    let cases = [
        ("missing", ""),
        ("../demo", ""),
        ("", ""),
        ("demo", "{not json"),
        ("demo", r#"{"network": "bridge"}"#),
        ("demo", r#"{"cpus": []}"#),
    ];
    for (id, config) in cases {
        let err = fx
            .framework
            .create(id, paths.as_slice(), None, config)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unknown, "{:?} {:?}", id, config);
    }

    assert!(fx.framework.containers().is_empty());
    assert_eq!(fx.backend().live_contexts(), 0);
}

#[test]
fn test_backend_rejection_releases_nothing() {
    let fx = Fixture::new();
    fx.backend().reject_prepare(true);

    let err = fx
        .framework
        .create("demo", fx.search_paths().as_slice(), None, "")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);
    assert_eq!(fx.backend().live_contexts(), 0);

    fx.backend().reject_prepare(false);
    fx.create("demo");
    assert_eq!(fx.backend().live_contexts(), 1);
}

#[test]
fn test_unresolvable_command_keeps_state() {
    let fx = Fixture::with_backend(SimulationBackend::new().with_missing_command("/bin/missing"));
    let handle = fx.create("demo");

    let err = fx.framework.start(&handle, "/bin/missing", NO_ARGS).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);
    assert_eq!(fx.framework.info(&handle).unwrap().state, ContainerState::Created);

    let err = fx.framework.start(&handle, "", NO_ARGS).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);

    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();
    assert!(fx.framework.running(&handle));
}

#[test]
fn test_definition_config_file_is_used() {
    let fx = Fixture::new();
    fx.define("web", Some(r#"{"network": "private", "cpus": [0, 1]}"#));

    let handle = fx.running("web", "");
    assert_eq!(fx.framework.cpu_cores(&handle).unwrap(), 2);
    let status = fx.framework.network_status_create(&handle).unwrap();
    assert!(status.interface("veth0").is_some());

    // An explicit blob overrides the file
    let other = fx.running("web", r#"{"network": "host"}"#);
    assert_eq!(fx.framework.cpu_cores(&other).unwrap(), 4);
}

#[test]
fn test_log_file_under_log_path() {
    let fx = Fixture::new();
    let logs = tempfile::tempdir().unwrap();
    let log_dir = logs.path().join("nested");

    let handle = fx
        .framework
        .create("demo", fx.search_paths().as_slice(), Some(&log_dir), "")
        .unwrap();
    assert_eq!(
        fx.framework.log_file(&handle).unwrap(),
        Some(log_dir.join("demo.log"))
    );
    assert!(log_dir.is_dir());

    let quiet = fx.create("demo");
    assert_eq!(fx.framework.log_file(&quiet).unwrap(), None);
}

#[test]
fn test_containers_in_creation_order() {
    let fx = Fixture::new();
    fx.define("a", None);
    fx.define("b", None);

    let b = fx.create("b");
    let _a = fx.create("a");
    let _demo = fx.create("demo");
    assert_eq!(fx.framework.containers(), vec!["b", "a", "demo"]);

    fx.framework.destroy(b).unwrap();
    assert_eq!(fx.framework.containers(), vec!["a", "demo"]);
}

#[test]
fn test_info_serializes() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let json = serde_json::to_value(fx.framework.info(&handle).unwrap()).unwrap();
    assert_eq!(json["id"], "demo");
    assert_eq!(json["state"], "running");
    assert_eq!(json["start_count"], 1);
    assert!(json["pid"].as_u64().unwrap() > 0);
}

#[test]
fn test_deinitialize_destroys_leftovers() {
    let fx = Fixture::new();
    let backend = fx.backend().clone();
    let idle = fx.create("demo");
    let busy = fx.running("demo", "");
    let clone = fx.framework.clone();

    fx.framework.deinitialize();

    assert_eq!(backend.live_contexts(), 0);
    assert_eq!(backend.live_processes(), 0);

    assert!(!clone.is_initialized());
    assert!(!clone.running(&busy));
    assert_eq!(clone.pid(&busy).unwrap_err().code(), ErrorCode::Unknown);
    assert_eq!(clone.info(&idle).unwrap_err().code(), ErrorCode::Unknown);
    assert!(clone.containers().is_empty());

    let err = clone
        .create("demo", vec![fx.dir.path().to_path_buf()].as_slice(), None, "")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);
    assert_eq!(backend.live_contexts(), 0);
}

#[test]
fn test_dropping_framework_releases_containers() {
    let backend = SimulationBackend::new();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("demo")).unwrap();

    {
        let framework = Framework::builder(backend.clone()).initialize();
        let handle = framework
            .create("demo", &[dir.path()][..], None, "")
            .unwrap();
        framework.start(&handle, "/bin/sleep", &["60"]).unwrap();
        assert_eq!(backend.live_processes(), 1);
    }

    assert_eq!(backend.live_processes(), 0);
    assert_eq!(backend.live_contexts(), 0);
}
