/*!
 * procfs Parsing Tests
 * Property tests for stat lines with hostile process names
 */

use process_containers::backend::procfs::{parse_stat, parse_statm};
use proptest::prelude::*;

fn stat_line(pid: u32, comm: &str, utime: u64, stime: u64, processor: u32) -> String {
    format!(
        "{pid} ({comm}) R 1 {pid} {pid} 0 -1 4194304 10 0 0 0 {utime} {stime} 0 0 20 0 1 0 \
         100 1000 10 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 {processor} 0 0 0 0 0"
    )
}

proptest! {
    #[test]
    fn parse_stat_survives_any_comm(
        comm in "[a-zA-Z0-9 ()]{0,15}",
        utime in 0u64..1_000_000,
        stime in 0u64..1_000_000,
        processor in 0u32..512,
    ) {
        let fields = parse_stat(&stat_line(4242, &comm, utime, stime, processor)).unwrap();
        prop_assert_eq!(fields.pid, 4242);
        prop_assert_eq!(fields.pgrp, 4242);
        prop_assert_eq!(fields.state, 'R');
        prop_assert_eq!(fields.utime, utime);
        prop_assert_eq!(fields.stime, stime);
        prop_assert_eq!(fields.processor, Some(processor));
        prop_assert_eq!(fields.own_ticks(), utime + stime);
    }

    #[test]
    fn parse_statm_never_panics(content in "([0-9]{1,6} ){0,4}", page in 1u64..65536) {
        if let Some(mem) = parse_statm(&content, page) {
            prop_assert_eq!(mem.allocated % page, 0);
        }
    }
}

#[test]
fn test_live_self_stat() {
    let content = std::fs::read_to_string("/proc/self/stat").unwrap();
    let fields = parse_stat(&content).unwrap();
    assert!(!fields.is_zombie());
    assert!(fields.processor.is_some());
}
