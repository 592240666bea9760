//! Runtime faults.
//!
//! A [`Fault`] is the only kind of error that interrupts statement execution.
//! It propagates out of [`Interpreter::exec_node`](super::interp::Interpreter)
//! until a `protect:` block intercepts it; builtin-module failures are a
//! separate, non-interrupting type ([`BuiltinError`](super::builtins::BuiltinError)).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("cannot add {left} and {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("integer overflow in {lhs} + {rhs}")]
    Overflow { lhs: i64, rhs: i64 },

    #[error("task '{task}' exceeded the maximum call depth of {limit}")]
    DepthExceeded { task: String, limit: usize },

    #[error("parallel tasks could not be scheduled: {0}")]
    Scheduler(String),
}

/// Error returned by the file-level entry points.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fault(#[from] Fault),
}
