/*!
 * containerctl - Demo Entry Point
 *
 * Runs one command in a container and prints a JSON report:
 *   containerctl <id> <search-path> <command> [params...]
 *
 * Environment:
 * - CONTAINER_LOG_DIR: directory for framework and container logs
 * - CONTAINER_LOG_OPTIONS: logging options (e.g. "level=debug;format=json")
 * - CONTAINER_CONFIG: configuration blob passed to create
 * - CONTAINER_RUN_SECS: seconds to let the command run before stopping (default 1)
 */

use miette::{miette, IntoDiagnostic, Result};
use process_containers::{configure_logging, network_status_destroy, HostFramework};
use serde_json::json;
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let usage = "usage: containerctl <id> <search-path> <command> [params...]";
    let id = args.next().ok_or_else(|| miette!(usage))?;
    let search_path = PathBuf::from(args.next().ok_or_else(|| miette!(usage))?);
    let command = args.next().ok_or_else(|| miette!(usage))?;
    let params: Vec<String> = args.collect();

    let log_dir = env::var_os("CONTAINER_LOG_DIR").map(PathBuf::from);
    let log_options = env::var("CONTAINER_LOG_OPTIONS").unwrap_or_default();
    let config = env::var("CONTAINER_CONFIG").unwrap_or_default();
    let run_secs: u64 = match env::var("CONTAINER_RUN_SECS") {
        Ok(value) => value.parse().into_diagnostic()?,
        Err(_) => 1,
    };

    configure_logging(log_dir.as_deref(), &log_options)?;

    let framework = HostFramework::initialize()?;
    let container = framework.create(&id, &[search_path][..], log_dir.as_deref(), &config)?;
    info!(container = %container, "container created");

    if let Err(e) = framework.start(&container, &command, params.as_slice()) {
        framework.destroy(container)?;
        return Err(e.into());
    }

    let pid = framework.pid(&container).ok();
    let memory = framework.memory_status(&container).ok();
    let network = match framework.network_status_create(&container) {
        Ok(status) => {
            let snapshot = serde_json::to_value(&status).into_diagnostic()?;
            network_status_destroy(status)?;
            snapshot
        }
        Err(e) => json!({ "error": e.code().to_string() }),
    };

    thread::sleep(Duration::from_secs(run_secs));

    let still_running = framework.running(&container);
    let mut per_core = vec![0u64; 256];
    let per_core = match framework.cpu_usage_per_core(&container, &mut per_core) {
        Ok(count) => Some(per_core[..count].to_vec()),
        Err(e) => {
            warn!(error = %e, "per-core CPU usage unavailable");
            None
        }
    };
    let cpu_total = framework.cpu_usage(&container, -1).ok();

    framework.stop(&container)?;
    let info = framework.info(&container)?;
    framework.destroy(container)?;
    framework.deinitialize();

    let report = json!({
        "container": info,
        "pid": pid,
        "running_after_secs": still_running,
        "memory": memory,
        "cpu_total_ns": cpu_total,
        "cpu_per_core_ns": per_core,
        "network": network,
    });
    println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    Ok(())
}
