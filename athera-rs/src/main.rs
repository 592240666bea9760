use std::process::ExitCode;

use log::{debug, warn, LevelFilter};

use athera::cli::{self, Command, ConfigFile, USAGE};
use athera::config::Config;
use athera::repl;
use athera::script::{build_runtime, Interpreter, RunError};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("athera: {e}");
            eprintln!("{USAGE}");
            return ExitCode::from(1);
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let mut logger = env_logger::Builder::from_default_env();
    if args.debug {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.format_timestamp(None).init();

    if args.command == Command::Usage {
        eprintln!("{USAGE}");
        return ExitCode::from(1);
    }

    // ── Interpreter setup ─────────────────────────────────────────────────────
    let mut interp = Interpreter::streaming();

    let config_path = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    if let Some(path) = config_path {
        debug!("loading config from {}", path.display());
        match Config::load_file(&path) {
            Ok((config, mut errors)) => {
                errors.extend(config.apply(&mut interp));
                for e in errors {
                    warn!("{}: {e}", path.display());
                }
            }
            Err(e) => eprintln!("athera: warning: {}: {e}", path.display()),
        }
    }

    for dir in cli::env_module_dirs().into_iter().chain(args.module_dirs) {
        interp.add_module_path(dir);
    }

    // Thread stacks are sized from the final depth limit.
    let runtime = match build_runtime(interp.max_depth()) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("athera: cannot start runtime: {e}");
            return ExitCode::from(1);
        }
    };
    runtime.block_on(dispatch(args.command, interp))
}

async fn dispatch(command: Command, mut interp: Interpreter) -> ExitCode {
    match command {
        Command::Run(path) => {
            let outcome = tokio::task::spawn_blocking(move || interp.run_file(&path)).await;
            match outcome {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(RunError::Fault(fault))) => {
                    eprintln!("athera: {fault}");
                    ExitCode::from(2)
                }
                Ok(Err(e)) => {
                    eprintln!("athera: {e}");
                    ExitCode::from(1)
                }
                Err(e) => {
                    eprintln!("athera: {e}");
                    ExitCode::from(1)
                }
            }
        }
        Command::Repl => match repl::run_repl(interp).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("athera: {e}");
                ExitCode::from(1)
            }
        },
        Command::Usage => ExitCode::from(1),
    }
}
