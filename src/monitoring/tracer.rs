/*!
 * Operation Tracing
 * Structured spans around container operations using the tracing crate
 *
 * Each span carries a trace id for correlation, the container id and the
 * operation's duration; operations over their threshold are logged as slow.
 */

use crate::core::{ContainerResult, ErrorCode};
use std::time::{Duration, Instant};
use tracing::{debug, span, warn, Level, Span};
use uuid::Uuid;

/// Threshold above which an operation is reported as slow
pub const SLOW_OPERATION: Duration = Duration::from_millis(100);

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one container operation
pub struct OperationSpan {
    span: Span,
    start: Instant,
    operation: &'static str,
    trace_id: String,
    slow_after: Duration,
}

impl OperationSpan {
    pub fn new(operation: &'static str, container: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "container_op",
            trace_id = %trace_id,
            operation = operation,
            container = container,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            operation,
            trace_id,
            slow_after: SLOW_OPERATION,
        }
    }

    /// Raise the slow threshold for operations expected to block
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_after = threshold;
        self
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Run `f` inside the span and record its outcome
    pub fn in_scope<T>(self, f: impl FnOnce() -> ContainerResult<T>) -> ContainerResult<T> {
        let result = {
            let _entered = self.span.enter();
            f()
        };
        self.finish(result)
    }

    /// Record the outcome and pass the result through
    pub fn finish<T>(self, result: ContainerResult<T>) -> ContainerResult<T> {
        let code = ErrorCode::of(&result);
        self.span.record("result", tracing::field::display(code));
        if let Err(ref e) = result {
            self.span.record("error", tracing::field::display(e));
            let _entered = self.span.enter();
            debug!(operation = self.operation, code = %code, "operation failed: {}", e);
        }
        result
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > self.slow_after {
            warn!(
                trace_id = %self.trace_id,
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow container operation"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                operation = self.operation,
                duration_us = duration.as_micros() as u64,
                "container operation completed"
            );
        }
    }
}

/// Create a span for a container operation
#[inline]
pub fn span_operation(operation: &'static str, container: &str) -> OperationSpan {
    OperationSpan::new(operation, container)
}
