//! `.atherarc` configuration file parser.
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `module_path <dir>` | append a module search directory |
//! | `max_depth <n>` | limit nested `run` calls |
//! | `set <name> = <expr>` | bind a variable before the program starts |
//! | Lines starting with `#` | comment, ignored |
//! | Anything else | silently skipped |

use std::path::{Path, PathBuf};

use log::trace;
use thiserror::Error;

use crate::script::interp::MAX_DEPTH_LIMIT;
use crate::script::Interpreter;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading or applying a config file.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// A `set` directive, evaluated when the config is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigVar {
    pub line: usize,
    pub name: String,
    pub expr: String,
}

/// Parsed configuration.
#[derive(Debug, Default)]
pub struct Config {
    pub module_paths: Vec<PathBuf>,
    pub max_depth: Option<usize>,
    pub vars: Vec<ConfigVar>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Returns the config and a list of any parse errors on recognised lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (directive, rest) = line
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((line, ""));
            let rest = rest.trim();

            let result = match directive {
                "module_path" => config.parse_module_path(rest),
                "max_depth" => config.parse_max_depth(rest),
                "set" => config.parse_set(rest, lineno),
                _ => {
                    trace!("config line {lineno}: skipping {directive:?}");
                    Ok(())
                }
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply the configuration to an interpreter.  `set` expressions that
    /// fault are returned as errors and leave the variable unbound.
    pub fn apply(&self, interp: &mut Interpreter) -> Vec<ConfigError> {
        for dir in &self.module_paths {
            interp.add_module_path(dir.clone());
        }
        if let Some(limit) = self.max_depth {
            interp.set_max_depth(limit);
        }

        let mut errors = Vec::new();
        for var in &self.vars {
            match interp.eval(&var.expr) {
                Ok(v) => interp.set_var(var.name.clone(), v),
                Err(fault) => errors.push(ConfigError {
                    line: var.line,
                    message: format!("set {}: {fault}", var.name),
                }),
            }
        }
        errors
    }

    // ── Directives ────────────────────────────────────────────────────────────

    fn parse_module_path(&mut self, rest: &str) -> Result<(), String> {
        if rest.is_empty() {
            return Err("module_path: missing directory".into());
        }
        self.module_paths.push(PathBuf::from(rest));
        Ok(())
    }

    fn parse_max_depth(&mut self, rest: &str) -> Result<(), String> {
        match rest.parse::<usize>() {
            Ok(n) if n > MAX_DEPTH_LIMIT => {
                Err(format!("max_depth: {n} exceeds the limit of {MAX_DEPTH_LIMIT}"))
            }
            Ok(n) if n > 0 => {
                self.max_depth = Some(n);
                Ok(())
            }
            _ => Err(format!("max_depth: expected a positive integer, got {rest:?}")),
        }
    }

    fn parse_set(&mut self, rest: &str, line: usize) -> Result<(), String> {
        let Some((name, expr)) = rest.split_once('=') else {
            return Err("set: expected <name> = <expr>".into());
        };
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(format!("set: invalid variable name {name:?}"));
        }
        self.vars.push(ConfigVar {
            line,
            name: name.to_owned(),
            expr: expr.trim().to_owned(),
        });
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
