//! Athera expression evaluator.
//!
//! Expressions are never tokenized.  Each inline expression substring is
//! resolved by trying a fixed sequence of forms, first match wins:
//!
//!   empty  →  quoted literal  →  list  →  map  →  boolean  →  integer  →
//!   float  →  variable  →  property  →  module call  →  binary `+`  →  text
//!
//! Anything that matches no form evaluates to its own trimmed text, so the
//! only failures are [`Fault`]s raised by `+` and builtin errors, which are
//! reported through the context and resolve to [`Value::Absent`].

use std::collections::BTreeMap;

use log::trace;

use super::builtins;
use super::fault::Fault;
use super::value::Value;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The [`Interpreter`](super::interp::Interpreter) implements this to expose
/// its variables and its output sink.
pub trait EvalContext {
    /// Look up a bound variable.
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Emit a report line (builtin errors).
    fn report(&mut self, line: String);
}

// ── Evaluation ────────────────────────────────────────────────────────────────

/// Evaluate an expression substring against `ctx`.
pub fn evaluate(expr: &str, ctx: &mut dyn EvalContext) -> Result<Value, Fault> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(Value::Str(String::new()));
    }

    if let Some(text) = quoted_literal(expr) {
        return Ok(Value::Str(text.to_owned()));
    }

    if let Some(inner) = enclosed(expr, '[', ']') {
        return eval_list(inner, ctx);
    }

    if let Some(inner) = enclosed(expr, '{', '}') {
        return eval_map(inner, ctx);
    }

    if expr.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if expr.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }

    if let Ok(n) = expr.parse::<i64>() {
        return Ok(Value::Int(n));
    }
    if let Ok(x) = expr.parse::<f64>() {
        return Ok(Value::Float(x));
    }

    if let Some(v) = ctx.get_var(expr) {
        return Ok(v);
    }

    if let Some(v) = property(expr, ctx) {
        return Ok(v);
    }

    if let Some(v) = module_call(expr, ctx)? {
        return Ok(v);
    }

    let operands = split_top_level(expr, |c| c == '+');
    if operands.len() == 2 {
        let left = evaluate(operands[0], ctx)?;
        let right = evaluate(operands[1], ctx)?;
        return add(left, right);
    }

    Ok(Value::Str(expr.to_owned()))
}

/// Binary `+`.
pub fn add(left: Value, right: Value) -> Result<Value, Fault> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or(Fault::Overflow { lhs: a, rhs: b }),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + b as f64)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Str(s), r) => Ok(Value::Str(format!("{s}{r}"))),
        (l, r) => Err(Fault::TypeMismatch {
            left: l.type_name(),
            right: r.type_name(),
        }),
    }
}

fn eval_list(inner: &str, ctx: &mut dyn EvalContext) -> Result<Value, Fault> {
    let items = split_list_items(inner)
        .into_iter()
        .map(|item| evaluate(item, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(items))
}

fn eval_map(inner: &str, ctx: &mut dyn EvalContext) -> Result<Value, Fault> {
    let mut map = BTreeMap::new();
    for item in split_list_items(inner) {
        let parts = split_top_level(item, |c| c == ':');
        if parts.len() < 2 {
            trace!("map literal: skipping entry without key: {item:?}");
            continue;
        }
        let key = parts[0].trim();
        let key = quoted_literal(key).unwrap_or(key);
        let value = evaluate(&item[parts[0].len() + 1..], ctx)?;
        map.insert(key.to_owned(), value);
    }
    Ok(Value::Map(map))
}

/// `name.length` / `name.is_empty` on a bound string or list.
fn property(expr: &str, ctx: &dyn EvalContext) -> Option<Value> {
    if expr.contains(char::is_whitespace) {
        return None;
    }
    let (base, prop) = expr.split_once('.')?;
    if prop.contains('.') {
        return None;
    }
    let (len, empty) = match ctx.get_var(base)? {
        Value::Str(s) => (s.chars().count(), s.is_empty()),
        Value::List(items) => (items.len(), items.is_empty()),
        _ => return None,
    };
    match prop {
        "length" => Some(Value::Int(len as i64)),
        "is_empty" => Some(Value::Bool(empty)),
        _ => None,
    }
}

/// `module.function arg1, arg2`.  `Ok(None)` when the name is not registered.
fn module_call(expr: &str, ctx: &mut dyn EvalContext) -> Result<Option<Value>, Fault> {
    let Some((module, rest)) = expr.split_once('.') else {
        return Ok(None);
    };
    let rest = rest.trim();
    let (func, arg_text) = rest.split_once(' ').unwrap_or((rest, ""));
    let Some(f) = builtins::lookup(module.trim(), func.trim()) else {
        return Ok(None);
    };

    let args = split_args(arg_text)
        .into_iter()
        .map(|a| evaluate(a, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    trace!("calling {}.{} with {} args", module.trim(), func.trim(), args.len());
    match f(&args) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            ctx.report(format!("[Error: {e}]"));
            Ok(Some(Value::Absent))
        }
    }
}

// ── Splitting helpers ─────────────────────────────────────────────────────────

/// Text of a single quoted literal: opens and closes with the same quote
/// character, which does not occur in between.
pub(crate) fn quoted_literal(expr: &str) -> Option<&str> {
    let q = expr.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = expr.strip_prefix(q)?.strip_suffix(q)?;
    (!inner.contains(q)).then_some(inner)
}

/// Inner text when `open` at the start is closed by the final `close`.
fn enclosed(expr: &str, open: char, close: char) -> Option<&str> {
    if !expr.starts_with(open) || !expr.ends_with(close) {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let last = expr.len() - close.len_utf8();
    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == open => depth += 1,
            None if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i == last).then(|| &expr[open.len_utf8()..last]);
                }
            }
            None => {}
        }
    }
    None
}

/// Split at every separator character that is outside quotes, brackets and
/// braces.  Pieces are returned untrimmed, so they always tile `s`.
pub(crate) fn split_top_level(s: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' | '{' => depth += 1,
                ']' | '}' => depth = depth.saturating_sub(1),
                _ if depth == 0 && is_sep(c) => {
                    pieces.push(&s[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    pieces.push(&s[start..]);
    pieces
}

/// Items of a list or map literal.  Empty middle items are kept; a blank
/// trailing item is dropped.
fn split_list_items(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut items = split_top_level(inner, |c| c == ',');
    if items.last().is_some_and(|s| s.trim().is_empty()) {
        items.pop();
    }
    items
}

/// Comma-separated call arguments, trimmed, blanks dropped.
pub(crate) fn split_args(s: &str) -> Vec<&str> {
    split_top_level(s, |c| c == ',')
        .into_iter()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Arguments of a `run` statement: comma-separated when the text has a
/// top-level comma, otherwise whitespace-separated.
pub(crate) fn split_run_args(s: &str) -> Vec<&str> {
    if split_top_level(s, |c| c == ',').len() > 1 {
        return split_args(s);
    }
    split_top_level(s, char::is_whitespace)
        .into_iter()
        .filter(|a| !a.is_empty())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
