/*!
 * Monitoring
 * Structured tracing for container operations
 */

mod tracer;

pub use tracer::{generate_trace_id, span_operation, OperationSpan, SLOW_OPERATION};
