/*!
 * Concurrency Tests
 * Control and monitoring threads racing on shared handles
 */

use super::common::Fixture;
use process_containers::ErrorCode;
use std::sync::Arc;
use std::thread;

#[test]
fn test_framework_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<process_containers::Framework<process_containers::SimulationBackend>>();
    assert_send_sync::<process_containers::Container>();
}

#[test]
fn test_monitor_races_stop_and_destroy() {
    let fx = Arc::new(Fixture::new());
    let handle = fx.running("demo", "");

    let monitors: Vec<_> = (0..4)
        .map(|_| {
            let fx = Arc::clone(&fx);
            let handle = handle.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ = fx.framework.running(&handle);
                    match fx.framework.memory_status(&handle) {
                        Ok(_) => {}
                        Err(e) => assert!(
                            matches!(e.code(), ErrorCode::Unknown | ErrorCode::InvalidKey),
                            "unexpected {:?}",
                            e
                        ),
                    }
                }
            })
        })
        .collect();

    fx.framework.stop(&handle).unwrap();
    fx.framework.start(&handle, "/bin/sleep", &["60"]).unwrap();
    fx.framework.destroy(handle).unwrap();

    for monitor in monitors {
        monitor.join().unwrap();
    }
    assert_eq!(fx.backend().live_processes(), 0);
    assert_eq!(fx.backend().live_contexts(), 0);
}

#[test]
fn test_parallel_create_destroy() {
    let fx = Arc::new(Fixture::new());

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || {
                for _ in 0..25 {
                    let handle = fx.running("demo", "");
                    assert!(fx.framework.running(&handle));
                    fx.framework.destroy(handle).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(fx.framework.containers().is_empty());
    assert_eq!(fx.backend().live_contexts(), 0);
}
