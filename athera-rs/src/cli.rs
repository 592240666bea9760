//! Command-line argument parsing.
//!
//! Usage:
//!   athera [-d] [-f[<file>]] [-M<dir>] run <file.ath>
//!   athera [-d] [-f[<file>]] [-M<dir>] repl

use std::path::PathBuf;

use directories::ProjectDirs;

pub const USAGE: &str = "\
Usage:
  athera [-d] [-f[<file>]] [-M<dir>] run <file.ath>
  athera [-d] [-f[<file>]] [-M<dir>] repl

Options:
  -d          debug logging
  -f<file>    read configuration from <file>; -f alone skips it
  -M<dir>     add <dir> to the module search path";

/// Name of the per-directory configuration file.
pub const RC_FILE: &str = ".atherarc";

/// Environment variable listing extra module directories.
pub const PATH_ENV: &str = "ATHERA_PATH";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which config file to load.
    pub config: ConfigFile,
    /// Module directories from `-M<dir>`, in order.
    pub module_dirs: Vec<PathBuf>,
    /// Debug mode (`-d`).
    pub debug: bool,
    /// Subcommand.
    pub command: Command,
}

/// How to choose the config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// `./.atherarc`, then the platform config directory (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip config.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

#[derive(Debug, Default, PartialEq)]
pub enum Command {
    /// No subcommand given: print usage.
    #[default]
    Usage,
    Run(PathBuf),
    Repl,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        // Non-flag argument.
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') && !is_subcommand(&argv[i + 1]) {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                // -M<dir>
                'M' => {
                    let dir = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-M requires a directory argument".to_owned());
                    };
                    args.module_dirs.push(PathBuf::from(dir));
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    args.command = match positional.next().as_deref() {
        None => Command::Usage,
        Some("run") => match positional.next() {
            Some(path) => Command::Run(PathBuf::from(path)),
            None => return Err("athera run requires a file path".to_owned()),
        },
        Some("repl") => Command::Repl,
        Some(other) => return Err(format!("unknown command: {other}")),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    Ok(args)
}

fn is_subcommand(arg: &str) -> bool {
    matches!(arg, "run" | "repl")
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the config file: `./.atherarc`, then `atherarc` in the platform
/// config directory.  Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let local = PathBuf::from(RC_FILE);
    if local.is_file() {
        return Some(local);
    }
    ProjectDirs::from("", "", "athera")
        .map(|dirs| dirs.config_dir().join("atherarc"))
        .filter(|p| p.is_file())
}

/// Module directories listed in `ATHERA_PATH`.
pub fn env_module_dirs() -> Vec<PathBuf> {
    std::env::var_os(PATH_ENV)
        .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
