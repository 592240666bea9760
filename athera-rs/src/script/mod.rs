//! Athera scripting language.
//!
//! A line-oriented automation language executed by a tree-walking
//! interpreter:
//!
//! - [`lexer`] classifies each physical line into tokens
//! - [`stmt`] builds the statement tree from indentation
//! - [`expr`] resolves inline expressions
//! - [`builtins`] holds the `io`, `text`, `math`, `list`, `dict`, `time`,
//!   `json` and `path` modules
//! - [`interp`] executes statements; [`parallel`] runs `run parallel` units
//!
//! # Quick start
//!
//! ```rust
//! use athera::script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.exec_source("set x = 6\nset y = x + 36\ngreet y").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! assert_eq!(interp.var("y"), Some(&Value::Int(42)));
//! ```

pub mod builtins;
pub mod expr;
pub mod fault;
pub mod interp;
pub mod lexer;
mod parallel;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use fault::{Fault, RunError};
pub use interp::{Interpreter, OutputMode};
pub use parallel::build_runtime;
pub use stmt::Node;
pub use value::Value;
