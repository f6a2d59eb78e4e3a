/*!
 * Core Module
 * Fundamental container types and error handling
 */

pub mod errors;
pub mod id;
pub mod serde;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use id::{HandleAllocator, HandleKey};
pub use types::*;
