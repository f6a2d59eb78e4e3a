/*!
 * Logging Configuration Tests
 * configure_logging across the framework lifecycle
 */

use pretty_assertions::assert_eq;
use process_containers::framework::{log_sink, LogFormat};
use process_containers::{configure_logging, ErrorCode, Framework, SimulationBackend};
use serial_test::serial;
use std::fs;

#[test]
#[serial]
fn test_configure_before_initialize() {
    let logs = tempfile::tempdir().unwrap();
    configure_logging(Some(logs.path()), "level=debug;format=compact").unwrap();

    let defs = tempfile::tempdir().unwrap();
    fs::create_dir(defs.path().join("demo")).unwrap();
    let framework = Framework::builder(SimulationBackend::new()).initialize();
    let handle = framework.create("demo", &[defs.path()][..], None, "").unwrap();
    framework.destroy(handle).unwrap();
    framework.deinitialize();

    let contents = fs::read_to_string(logs.path().join("containers.log")).unwrap();
    assert!(contents.contains("Container framework initialized"), "{}", contents);
    assert!(contents.contains("Destroyed container demo"), "{}", contents);
    assert!(contents.contains("Container framework deinitialized"), "{}", contents);

    configure_logging(None, "").unwrap();
}

#[test]
#[serial]
fn test_reconfigure_switches_format_and_file() {
    let logs = tempfile::tempdir().unwrap();

    configure_logging(Some(logs.path()), "format=compact;file=first.log").unwrap();
    tracing::info!("record-one");

    configure_logging(Some(logs.path()), "format=json;file=second.log").unwrap();
    tracing::info!("record-two");

    let first = fs::read_to_string(logs.path().join("first.log")).unwrap();
    let second = fs::read_to_string(logs.path().join("second.log")).unwrap();
    assert!(first.contains("record-one"));
    assert!(!first.contains("record-two"));

    let line = second.lines().find(|l| l.contains("record-two")).unwrap();
    let record: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(record["fields"]["message"], "record-two");
    assert_eq!(log_sink().unwrap().format(), LogFormat::Json);

    configure_logging(None, "").unwrap();
}

#[test]
#[serial]
fn test_level_filter_applies() {
    let logs = tempfile::tempdir().unwrap();
    configure_logging(Some(logs.path()), "level=warn;file=filtered.log").unwrap();

    tracing::info!("quiet-record");
    tracing::warn!("loud-record");

    let contents = fs::read_to_string(logs.path().join("filtered.log")).unwrap();
    assert!(!contents.contains("quiet-record"));
    assert!(contents.contains("loud-record"));

    configure_logging(None, "").unwrap();
}

#[test]
#[serial]
fn test_invalid_options() {
    let err = configure_logging(None, "level=info;destination=syslog").unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidKey);

    let err = configure_logging(None, "format=yaml").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);

    let blocker = tempfile::NamedTempFile::new().unwrap();
    let err = configure_logging(Some(blocker.path()), "").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unknown);
}
