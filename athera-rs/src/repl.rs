//! Interactive read-eval-print loop.
//!
//! A single line that does not open a block (`:` suffix) runs immediately.
//! Block headers start a buffer that runs when a blank line is entered.
//! `exit` or `quit` leave the session; end of input runs whatever is still
//! buffered.

use std::io::Write as _;

use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::script::Interpreter;

pub const BANNER: &str = "Athera REPL\n\
    Type 'exit' or 'quit' to leave. Enter blank line to execute a multi-line block.";

const PROMPT: &str = "athera> ";
const CONTINUATION_PROMPT: &str = "... ";

// ── Line buffer ───────────────────────────────────────────────────────────────

/// What the REPL should do after a line of input.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplInput {
    Exit,
    Execute(String),
    Continue,
}

/// Accumulates lines until a complete chunk of source is available.
#[derive(Debug, Default)]
pub struct ReplBuffer {
    lines: Vec<String>,
}

impl ReplBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a multi-line block is being collected.
    pub fn is_continuation(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn feed(&mut self, line: &str) -> ReplInput {
        let trimmed = line.trim();
        if trimmed == "exit" || trimmed == "quit" {
            return ReplInput::Exit;
        }

        if trimmed.is_empty() {
            return match self.finish() {
                Some(src) => ReplInput::Execute(src),
                None => ReplInput::Continue,
            };
        }

        self.lines.push(line.to_owned());
        if self.lines.len() == 1 && !trimmed.ends_with(':') {
            return ReplInput::Execute(std::mem::take(&mut self.lines).remove(0));
        }
        ReplInput::Continue
    }

    /// Take any buffered source.
    pub fn finish(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.lines).join("\n"))
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// `true` when both stdin and stdout are terminals.
pub fn is_interactive() -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// Run a REPL session on stdin.
pub async fn run_repl(interp: Interpreter) -> std::io::Result<Interpreter> {
    let stdin = BufReader::new(tokio::io::stdin());
    run_repl_with(interp, stdin, is_interactive()).await
}

/// Run a REPL session over any line source.  Chunks execute on the blocking
/// pool; the interpreter is handed back when the session ends.
pub async fn run_repl_with<R>(
    mut interp: Interpreter,
    reader: R,
    prompts: bool,
) -> std::io::Result<Interpreter>
where
    R: AsyncBufRead + Unpin,
{
    println!("{BANNER}");
    let mut buffer = ReplBuffer::new();
    let mut lines = reader.lines();

    loop {
        if prompts {
            let prompt = if buffer.is_continuation() { CONTINUATION_PROMPT } else { PROMPT };
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "{prompt}");
            let _ = out.flush();
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match buffer.feed(&line) {
            ReplInput::Exit => {
                println!("Goodbye.");
                return Ok(interp);
            }
            ReplInput::Execute(src) => interp = execute_chunk(interp, src).await?,
            ReplInput::Continue => {}
        }
    }

    if let Some(src) = buffer.finish() {
        interp = execute_chunk(interp, src).await?;
    }
    println!("Goodbye.");
    Ok(interp)
}

async fn execute_chunk(mut interp: Interpreter, src: String) -> std::io::Result<Interpreter> {
    debug!("repl: executing {} bytes", src.len());
    let (interp, result) = tokio::task::spawn_blocking(move || {
        let result = interp.exec_source(&src);
        (interp, result)
    })
    .await
    .map_err(std::io::Error::other)?;

    if let Err(fault) = result {
        eprintln!("athera: {fault}");
    }
    Ok(interp)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_executes_immediately() {
        let mut buf = ReplBuffer::new();
        assert_eq!(buf.feed("greet hi"), ReplInput::Execute("greet hi".into()));
        assert!(!buf.is_continuation());
    }

    #[test]
    fn block_runs_on_blank_line() {
        let mut buf = ReplBuffer::new();
        assert_eq!(buf.feed("repeat 2 times:"), ReplInput::Continue);
        assert!(buf.is_continuation());
        assert_eq!(buf.feed("    greet x"), ReplInput::Continue);
        assert_eq!(
            buf.feed(""),
            ReplInput::Execute("repeat 2 times:\n    greet x".into())
        );
        assert!(!buf.is_continuation());
    }

    #[test]
    fn blank_line_with_empty_buffer() {
        let mut buf = ReplBuffer::new();
        assert_eq!(buf.feed("   "), ReplInput::Continue);
    }

    #[test]
    fn exit_and_quit() {
        let mut buf = ReplBuffer::new();
        assert_eq!(buf.feed("exit"), ReplInput::Exit);
        assert_eq!(buf.feed("  quit "), ReplInput::Exit);
    }

    #[test]
    fn finish_returns_pending_block() {
        let mut buf = ReplBuffer::new();
        buf.feed("task t:");
        buf.feed("  greet t");
        assert_eq!(buf.finish(), Some("task t:\n  greet t".into()));
        assert_eq!(buf.finish(), None);
    }

    #[tokio::test]
    async fn session_keeps_state_and_survives_faults() {
        let input: &[u8] = b"set x = 1\nset y = x + true\ntask t:\n  greet x\n\nrun t\n";
        let interp = run_repl_with(Interpreter::new(), BufReader::new(input), false)
            .await
            .unwrap();
        assert_eq!(interp.output, vec!["1"]);
    }

    #[tokio::test]
    async fn pending_block_runs_at_end_of_input() {
        let input: &[u8] = b"repeat 2 times:\n  greet again";
        let interp = run_repl_with(Interpreter::new(), BufReader::new(input), false)
            .await
            .unwrap();
        assert_eq!(interp.output, vec!["again", "again"]);
    }

    #[tokio::test]
    async fn exit_stops_reading() {
        let input: &[u8] = b"greet a\nexit\ngreet b\n";
        let interp = run_repl_with(Interpreter::new(), BufReader::new(input), false)
            .await
            .unwrap();
        assert_eq!(interp.output, vec!["a"]);
    }
}
