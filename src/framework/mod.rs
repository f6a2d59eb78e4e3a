/*!
 * Framework
 * Process-wide context and diagnostic configuration
 */

mod context;
pub mod logging;

pub use context::{Framework, FrameworkBuilder};
#[cfg(target_os = "linux")]
pub use context::HostFramework;
pub use logging::{configure_logging, log_sink, LogFormat, LoggingOptions};
