//! Line-oriented lexer.
//!
//! Every physical line is classified on its own by keyword prefix/suffix and
//! turns into at most three tokens: an optional [`TokenKind::Indent`], exactly
//! one content token, and a [`TokenKind::Newline`].  Blank lines and `#`
//! comments produce nothing at all, so the parser never counts lines to track
//! indentation.  Unrecognised lines become [`TokenKind::Unknown`]; the lexer
//! has no error path.
//!
//! Content tokens carry a construct-specific payload in [`Token::value`];
//! multi-field payloads are joined with `|` (e.g. `backup a to b` → `a|b`).

use std::sync::LazyLock;

use log::trace;
use regex::Regex;

static REPEAT_EACH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^repeat each (\w+) in (.+):$").expect("valid regex"));
static REPEAT_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^repeat (\d+) times:$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Leading whitespace of a line; value is the character count.
    Indent,
    Newline,
    Task,
    Greet,
    Backup,
    Check,
    RepeatN,
    RepeatEach,
    Set,
    Run,
    RunParallel,
    Use,
    Protect,
    Handle,
    HandleInline,
    Return,
    Unknown,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, line: usize) -> Self {
        Token { kind, value: value.into(), line }
    }
}

/// Tokenize a whole source text.  The result always ends with one
/// [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Vec<Token> {
    trace!("tokenizing {} bytes", src.len());
    let mut tokens = Vec::new();
    let mut line_count = 0;

    for (idx, raw) in src.split('\n').enumerate() {
        let line = idx + 1;
        line_count = line;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = raw.len() - raw.trim_start_matches([' ', '\t']).len();
        if indent > 0 {
            tokens.push(Token::new(TokenKind::Indent, indent.to_string(), line));
        }
        tokens.push(classify(trimmed, line));
        tokens.push(Token::new(TokenKind::Newline, "", line));
    }

    tokens.push(Token::new(TokenKind::Eof, "", line_count));
    tokens
}

/// Classify one trimmed, non-blank line into its content token.
fn classify(line: &str, lineno: usize) -> Token {
    use TokenKind::*;

    if let Some(def) = line.strip_prefix("task ").and_then(|r| r.strip_suffix(':')) {
        let def = def.trim();
        let value = match def.split_once(" with ") {
            Some((name, params)) => format!("{}|{}", name.trim(), split_csv(params).join(",")),
            None => def.to_owned(),
        };
        return Token::new(Task, value, lineno);
    }

    if let Some(msg) = line.strip_prefix("greet ") {
        return Token::new(Greet, msg.trim(), lineno);
    }

    if let Some((src, dest)) = line.strip_prefix("backup ").and_then(|r| r.trim().split_once(" to ")) {
        return Token::new(Backup, format!("{src}|{dest}"), lineno);
    }

    if let Some((cond, action)) = line.strip_prefix("check ").and_then(|r| r.trim().split_once(" -> ")) {
        return Token::new(Check, format!("{cond}|{action}"), lineno);
    }

    if line.starts_with("repeat ") && line.ends_with(':') {
        if let Some(caps) = REPEAT_EACH.captures(line) {
            return Token::new(RepeatEach, format!("{}|{}", &caps[1], caps[2].trim()), lineno);
        }
        if let Some(caps) = REPEAT_N.captures(line) {
            return Token::new(RepeatN, &caps[1], lineno);
        }
        return Token::new(Unknown, line, lineno);
    }

    if let Some((var, expr)) = line.strip_prefix("set ").and_then(|r| r.trim().split_once(" = ")) {
        return Token::new(Set, format!("{var}|{expr}"), lineno);
    }

    if let Some(rest) = line.strip_prefix("run ") {
        let rest = rest.trim();
        return match rest.strip_prefix("parallel ") {
            Some(names) => Token::new(RunParallel, split_csv(names).join(","), lineno),
            None => Token::new(Run, rest, lineno),
        };
    }

    if let Some(module) = line.strip_prefix("use ") {
        return Token::new(Use, module.trim(), lineno);
    }

    match line {
        "protect:" => return Token::new(Protect, "", lineno),
        "handle:" => return Token::new(Handle, "", lineno),
        _ => {}
    }

    if let Some((kind, action)) = line.strip_prefix("handle ").and_then(|r| r.trim().split_once(" -> ")) {
        return Token::new(HandleInline, format!("{kind}|{action}"), lineno);
    }

    if let Some(expr) = line.strip_prefix("return ") {
        return Token::new(Return, expr.trim(), lineno);
    }

    Token::new(Unknown, line, lineno)
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    fn content(line: &str) -> Token {
        tokenize(line).into_iter().next().expect("at least one token")
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(kinds(""), vec![Eof]);
    }

    #[test]
    fn blank_and_comment_lines_emit_nothing() {
        assert_eq!(kinds("\n   \n# note\n    # indented note\n"), vec![Eof]);
    }

    #[test]
    fn indented_line_shape() {
        let toks = tokenize("  \tgreet hi");
        assert_eq!(toks[0].kind, Indent);
        assert_eq!(toks[0].value, "3");
        assert_eq!(toks[1].kind, Greet);
        assert_eq!(toks[1].value, "hi");
        assert_eq!(toks[2].kind, Newline);
        assert_eq!(toks[3].kind, Eof);
    }

    #[test]
    fn line_numbers_count_skipped_lines() {
        let toks = tokenize("# header\n\ngreet a");
        assert_eq!(toks[0].line, 3);
    }

    #[test]
    fn task_payloads() {
        assert_eq!(content("task deploy:").value, "deploy");
        let t = content("task greeter with name , greeting,:");
        assert_eq!(t.kind, Task);
        assert_eq!(t.value, "greeter|name,greeting");
    }

    #[test]
    fn task_without_colon_is_unknown() {
        assert_eq!(content("task deploy").kind, Unknown);
    }

    #[test]
    fn backup_and_check_split_at_first_separator() {
        let b = content(r#"backup "a to b.txt" to "out""#);
        assert_eq!(b.kind, Backup);
        assert_eq!(b.value, r#""a|b.txt" to "out""#);

        let c = content("check ready -> greet go -> now");
        assert_eq!(c.kind, Check);
        assert_eq!(c.value, "ready|greet go -> now");
    }

    #[test]
    fn repeat_forms() {
        let each = content("repeat each item in [1, 2]:");
        assert_eq!(each.kind, RepeatEach);
        assert_eq!(each.value, "item|[1, 2]");

        let n = content("repeat 3 times:");
        assert_eq!(n.kind, RepeatN);
        assert_eq!(n.value, "3");

        assert_eq!(content("repeat often:").kind, Unknown);
    }

    #[test]
    fn set_run_use_return() {
        assert_eq!(content("set x = 1 + 2").value, "x|1 + 2");
        assert_eq!(content("set x=1").kind, Unknown);

        let r = content("run greeter \"Ada\"");
        assert_eq!(r.kind, Run);
        assert_eq!(r.value, "greeter \"Ada\"");

        let p = content("run parallel a, b ,,c");
        assert_eq!(p.kind, RunParallel);
        assert_eq!(p.value, "a,b,c");

        assert_eq!(content("use text").value, "text");
        assert_eq!(content("return x + 1").value, "x + 1");
    }

    #[test]
    fn protect_and_handle_forms() {
        assert_eq!(content("protect:").kind, Protect);
        assert_eq!(content("handle:").kind, Handle);
        let h = content("handle any -> greet oops");
        assert_eq!(h.kind, HandleInline);
        assert_eq!(h.value, "any|greet oops");
        assert_eq!(content("handle it").kind, Unknown);
    }

    #[test]
    fn keyword_without_argument_is_unknown() {
        assert_eq!(content("greet").kind, Unknown);
        assert_eq!(content("greet").value, "greet");
    }

    #[test]
    fn crlf_line_endings() {
        assert_eq!(kinds("greet a\r\ngreet b\r\n"), vec![Greet, Newline, Greet, Newline, Eof]);
    }
}
