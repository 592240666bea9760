//! Athera: a line-oriented automation scripting language.
//!
//! The language itself lives in [`script`]; [`cli`], [`config`] and [`repl`]
//! are the glue used by the `athera` binary.

pub mod cli;
pub mod config;
pub mod repl;
pub mod script;
