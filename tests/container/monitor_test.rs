/*!
 * Resource Monitor Tests
 * Memory, CPU and pid queries
 */

use super::common::Fixture;
use pretty_assertions::assert_eq;
use process_containers::{ContainerError, ErrorCode};
use std::thread;
use std::time::Duration;

#[test]
fn test_aggregate_dominates_every_core() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    thread::sleep(Duration::from_millis(5));

    let cores = fx.framework.cpu_cores(&handle).unwrap();
    assert_eq!(cores, 4);
    for k in 0..cores as i32 {
        let core = fx.framework.cpu_usage(&handle, k).unwrap();
        let total = fx.framework.cpu_usage(&handle, -1).unwrap();
        assert!(total >= core, "core {}: {} > {}", k, core, total);
    }
}

#[test]
fn test_core_out_of_range() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let err = fx.framework.cpu_usage(&handle, 99).unwrap_err();
    assert_eq!(
        err,
        ContainerError::OutOfBounds {
            index: 99,
            available: 4
        }
    );
    assert_eq!(err.code(), ErrorCode::OutOfBounds);

    let err = fx.framework.cpu_usage(&handle, 4).unwrap_err();
    assert_eq!(err.code(), ErrorCode::OutOfBounds);

    let err = fx.framework.cpu_usage(&handle, -2).unwrap_err();
    assert_eq!(
        err,
        ContainerError::OutOfBounds {
            index: -2,
            available: 4
        }
    );
}

#[test]
fn test_cpu_usage_is_monotonic() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let mut last = 0;
    for _ in 0..5 {
        let now = fx.framework.cpu_usage(&handle, -1).unwrap();
        assert!(now >= last);
        last = now;
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_every_core_is_monotonic() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let mut last = [0u64; 4];
    for _ in 0..5 {
        for (k, previous) in last.iter_mut().enumerate() {
            let now = fx.framework.cpu_usage(&handle, k as i32).unwrap();
            assert!(now >= *previous, "core {} went from {} to {}", k, previous, now);
            *previous = now;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_counters_restart_with_the_process() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    thread::sleep(Duration::from_millis(50));

    let total_before = fx.framework.cpu_usage(&handle, -1).unwrap();
    let core_before = fx.framework.cpu_usage(&handle, 0).unwrap();
    fx.framework.stop(&handle).unwrap();
    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();

    assert!(fx.framework.cpu_usage(&handle, -1).unwrap() < total_before);
    assert!(fx.framework.cpu_usage(&handle, 0).unwrap() < core_before);
}

#[test]
fn test_per_core_buffer_too_small() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let mut out = [u64::MAX; 2];
    let err = fx.framework.cpu_usage_per_core(&handle, &mut out).unwrap_err();
    assert_eq!(
        err,
        ContainerError::MoreDataAvailable {
            required: 4,
            provided: 2
        }
    );
    assert_eq!(err.code(), ErrorCode::MoreDataAvailable);
    assert_eq!(out, [u64::MAX; 2]);
}

#[test]
fn test_per_core_fills_prefix() {
    let fx = Fixture::new();
    let handle = fx.running("demo", r#"{"cpus": [2, 3]}"#);
    thread::sleep(Duration::from_millis(2));

    let mut out = [u64::MAX; 8];
    let count = fx.framework.cpu_usage_per_core(&handle, &mut out).unwrap();
    assert_eq!(count, 2);
    assert!(out[..2].iter().all(|&ns| ns < u64::MAX));
    assert!(out[2..].iter().all(|&ns| ns == u64::MAX));

    let total = fx.framework.cpu_usage(&handle, -1).unwrap();
    assert!(total >= out[0]);
}

#[test]
fn test_queries_on_stopped_container() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");
    fx.framework.stop(&handle).unwrap();

    assert_eq!(
        fx.framework.memory_status(&handle).unwrap_err().code(),
        ErrorCode::Unknown
    );
    assert_eq!(fx.framework.cpu_usage(&handle, -1).unwrap_err().code(), ErrorCode::Unknown);
    assert_eq!(fx.framework.pid(&handle).unwrap_err().code(), ErrorCode::Unknown);

    let mut out = [0u64; 4];
    assert_eq!(
        fx.framework.cpu_usage_per_core(&handle, &mut out).unwrap_err().code(),
        ErrorCode::Unknown
    );
}

#[test]
fn test_memory_snapshot_fresh_per_call() {
    let fx = Fixture::new();
    let handle = fx.running("demo", "");

    let first = fx.framework.memory_status(&handle).unwrap();
    let second = fx.framework.memory_status(&handle).unwrap();
    assert_eq!(first, second);
    assert!(first.shared <= first.resident);

    let pid = fx.framework.pid(&handle).unwrap();
    fx.backend().kill_process(pid);
    assert!(fx.framework.memory_status(&handle).is_err());
}
