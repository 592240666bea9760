//! Builtin capability modules.
//!
//! Every function receives already-evaluated arguments and returns
//! `Result<Value, BuiltinError>`.  The registry is built once per process and
//! never changes; `use` statements do not gate access to it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use thiserror::Error;

use super::value::Value;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, BuiltinError>;

type Module = HashMap<&'static str, BuiltinFn>;

#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("{func} expects {expected}")]
    Arity {
        func: &'static str,
        expected: &'static str,
    },

    #[error("{func}: got {got}, expected {expected}")]
    Type {
        func: &'static str,
        got: &'static str,
        expected: &'static str,
    },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("division by zero")]
    DivideByZero,

    #[error("{func}: index {index} out of bounds")]
    OutOfBounds { func: &'static str, index: i64 },

    #[error("dict.get: key '{0}' not found")]
    MissingKey(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("time.format: {0}")]
    Format(String),
}

static REGISTRY: LazyLock<HashMap<&'static str, Module>> = LazyLock::new(|| {
    HashMap::from([
        ("io", io_module()),
        ("text", text_module()),
        ("math", math_module()),
        ("list", list_module()),
        ("dict", dict_module()),
        ("time", time_module()),
        ("json", json_module()),
        ("path", path_module()),
    ])
});

/// Find `module.function` in the registry.
pub fn lookup(module: &str, function: &str) -> Option<BuiltinFn> {
    REGISTRY.get(module)?.get(function).copied()
}

pub fn has_module(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn expect_args(
    args: &[Value],
    n: usize,
    func: &'static str,
    expected: &'static str,
) -> Result<(), BuiltinError> {
    if args.len() < n {
        return Err(BuiltinError::Arity { func, expected });
    }
    Ok(())
}

fn text(args: &[Value], idx: usize) -> String {
    args.get(idx).map(Value::to_string).unwrap_or_default()
}

fn number(v: &Value, func: &'static str) -> Result<f64, BuiltinError> {
    v.as_number().ok_or(BuiltinError::Type {
        func,
        got: v.type_name(),
        expected: "number",
    })
}

fn list_arg<'a>(args: &'a [Value], func: &'static str) -> Result<&'a [Value], BuiltinError> {
    match &args[0] {
        Value::List(items) => Ok(items),
        other => Err(BuiltinError::Type {
            func,
            got: other.type_name(),
            expected: "list",
        }),
    }
}

fn map_arg<'a>(
    args: &'a [Value],
    func: &'static str,
) -> Result<&'a std::collections::BTreeMap<String, Value>, BuiltinError> {
    match &args[0] {
        Value::Map(map) => Ok(map),
        other => Err(BuiltinError::Type {
            func,
            got: other.type_name(),
            expected: "dict",
        }),
    }
}

fn io_err(path: &str) -> impl FnOnce(std::io::Error) -> BuiltinError + '_ {
    move |source| BuiltinError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Parent directory with `.` for bare names.
fn dir_of(path: &str) -> String {
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.display().to_string(),
        Some(_) => ".".into(),
        None if path.starts_with('/') => "/".into(),
        None => ".".into(),
    }
}

/// Final path component; `.` for an empty path.
fn base_of(path: &str) -> String {
    match Path::new(path).file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None if path.is_empty() => ".".into(),
        None => path.to_owned(),
    }
}

// ── io ────────────────────────────────────────────────────────────────────────

fn io_module() -> Module {
    HashMap::from([
        ("read", io_read as BuiltinFn),
        ("write", io_write),
        ("append", io_append),
        ("exists", path_exists),
        ("read_lines", io_read_lines),
        ("size", io_size),
        ("dirname", path_dir),
        ("basename", path_base),
        ("list", io_list),
        ("copy", io_copy),
    ])
}

fn io_read(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "io.read", "path")?;
    let path = text(args, 0);
    let data = fs::read_to_string(&path).map_err(io_err(&path))?;
    Ok(Value::Str(data))
}

fn io_write(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "io.write", "path and data")?;
    let path = text(args, 0);
    fs::write(&path, text(args, 1)).map_err(io_err(&path))?;
    Ok(Value::Absent)
}

fn io_append(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "io.append", "path and data")?;
    let path = text(args, 0);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err(&path))?;
    file.write_all(text(args, 1).as_bytes())
        .map_err(io_err(&path))?;
    Ok(Value::Absent)
}

fn io_read_lines(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "io.read_lines", "path")?;
    let path = text(args, 0);
    let data = fs::read_to_string(&path).map_err(io_err(&path))?;
    let data = data.replace("\r\n", "\n");
    let mut lines: Vec<Value> = data.split('\n').map(Value::from).collect();
    if lines.last() == Some(&Value::Str(String::new())) {
        lines.pop();
    }
    Ok(Value::List(lines))
}

fn io_size(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "io.size", "path")?;
    let path = text(args, 0);
    let meta = fs::metadata(&path).map_err(io_err(&path))?;
    Ok(Value::Int(meta.len() as i64))
}

fn io_list(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "io.list", "directory")?;
    let path = text(args, 0);
    let mut names = Vec::new();
    for entry in fs::read_dir(&path).map_err(io_err(&path))? {
        let entry = entry.map_err(io_err(&path))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(Value::List(names.into_iter().map(Value::Str).collect()))
}

fn io_copy(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "io.copy", "source and destination")?;
    let src = text(args, 0);
    let bytes = fs::copy(&src, text(args, 1)).map_err(io_err(&src))?;
    Ok(Value::Int(bytes as i64))
}

// ── text ──────────────────────────────────────────────────────────────────────

fn text_module() -> Module {
    HashMap::from([
        ("length", text_length as BuiltinFn),
        ("upper", text_upper),
        ("lower", text_lower),
        ("trim", text_trim),
        ("split", text_split),
        ("contains", text_contains),
        ("starts_with", text_starts_with),
        ("ends_with", text_ends_with),
        ("replace", text_replace),
        ("join", text_join),
    ])
}

fn text_length(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "text.length", "string")?;
    Ok(Value::Int(text(args, 0).chars().count() as i64))
}

fn text_upper(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "text.upper", "string")?;
    Ok(Value::Str(text(args, 0).to_uppercase()))
}

fn text_lower(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "text.lower", "string")?;
    Ok(Value::Str(text(args, 0).to_lowercase()))
}

/// `trim(s[, cutset])`; the default cutset is a single space.
fn text_trim(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "text.trim", "string")?;
    let cutset = if args.len() > 1 { text(args, 1) } else { " ".into() };
    let s = text(args, 0);
    Ok(Value::Str(s.trim_matches(|c| cutset.contains(c)).to_owned()))
}

fn text_split(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "text.split", "string and delimiter")?;
    let s = text(args, 0);
    let delim = text(args, 1);
    let parts: Vec<Value> = if delim.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        s.split(delim.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn text_contains(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "text.contains", "haystack and needle")?;
    Ok(Value::Bool(text(args, 0).contains(&text(args, 1))))
}

fn text_starts_with(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "text.starts_with", "haystack and prefix")?;
    Ok(Value::Bool(text(args, 0).starts_with(&text(args, 1))))
}

fn text_ends_with(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "text.ends_with", "haystack and suffix")?;
    Ok(Value::Bool(text(args, 0).ends_with(&text(args, 1))))
}

fn text_replace(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 3, "text.replace", "string, pattern and replacement")?;
    Ok(Value::Str(text(args, 0).replace(&text(args, 1), &text(args, 2))))
}

fn text_join(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "text.join", "list and separator")?;
    let items = list_arg(args, "text.join")?;
    let sep = text(args, 1);
    let joined = items.iter().map(Value::to_string).collect::<Vec<_>>().join(&sep);
    Ok(Value::Str(joined))
}

// ── math ──────────────────────────────────────────────────────────────────────

fn math_module() -> Module {
    HashMap::from([
        ("add", math_add as BuiltinFn),
        ("sub", math_sub),
        ("mul", math_mul),
        ("div", math_div),
        ("sqrt", math_sqrt),
        ("abs", math_abs),
        ("pow", math_pow),
        ("round", math_round),
    ])
}

/// Fold `args` with `int_op` while every operand is an integer and nothing
/// overflows, otherwise with `float_op`.  A `None` seed folds from the first
/// operand.
fn fold_numbers(
    args: &[Value],
    func: &'static str,
    seed: Option<i64>,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, BuiltinError> {
    let ints: Option<Vec<i64>> = args
        .iter()
        .map(|v| match v {
            Value::Int(n) => Some(*n),
            _ => None,
        })
        .collect();
    if let Some(ints) = ints {
        let (init, rest) = match (seed, ints.split_first()) {
            (Some(s), _) => (s, &ints[..]),
            (None, Some((first, rest))) => (*first, rest),
            (None, None) => (0, &ints[..]),
        };
        if let Some(total) = rest.iter().try_fold(init, |acc, &n| int_op(acc, n)) {
            return Ok(Value::Int(total));
        }
    }

    let nums = args
        .iter()
        .map(|v| number(v, func))
        .collect::<Result<Vec<_>, _>>()?;
    let (init, rest) = match (seed, nums.split_first()) {
        (Some(s), _) => (s as f64, &nums[..]),
        (None, Some((first, rest))) => (*first, rest),
        (None, None) => (0.0, &nums[..]),
    };
    Ok(Value::Float(rest.iter().fold(init, |acc, &n| float_op(acc, n))))
}

fn math_add(args: &[Value]) -> Result<Value, BuiltinError> {
    fold_numbers(args, "math.add", Some(0), i64::checked_add, |a, b| a + b)
}

fn math_sub(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "math.sub", "at least 2 numbers")?;
    fold_numbers(args, "math.sub", None, i64::checked_sub, |a, b| a - b)
}

fn math_mul(args: &[Value]) -> Result<Value, BuiltinError> {
    fold_numbers(args, "math.mul", Some(1), i64::checked_mul, |a, b| a * b)
}

fn math_div(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "math.div", "at least 2 numbers")?;
    let mut total = number(&args[0], "math.div")?;
    for v in &args[1..] {
        let denom = number(v, "math.div")?;
        if denom == 0.0 {
            return Err(BuiltinError::DivideByZero);
        }
        total /= denom;
    }
    Ok(Value::Float(total))
}

fn math_sqrt(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "math.sqrt", "number")?;
    Ok(Value::Float(number(&args[0], "math.sqrt")?.sqrt()))
}

fn math_abs(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "math.abs", "number")?;
    if let Value::Int(n) = args[0] {
        if let Some(abs) = n.checked_abs() {
            return Ok(Value::Int(abs));
        }
    }
    Ok(Value::Float(number(&args[0], "math.abs")?.abs()))
}

fn math_pow(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "math.pow", "base and exponent")?;
    if let (Value::Int(base), Value::Int(exp)) = (&args[0], &args[1]) {
        if let Some(n) = u32::try_from(*exp).ok().and_then(|e| base.checked_pow(e)) {
            return Ok(Value::Int(n));
        }
    }
    let base = number(&args[0], "math.pow")?;
    let exp = number(&args[1], "math.pow")?;
    Ok(Value::Float(base.powf(exp)))
}

fn math_round(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "math.round", "number")?;
    let x = number(&args[0], "math.round")?.round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(BuiltinError::Type {
            func: "math.round",
            got: args[0].type_name(),
            expected: "finite number in integer range",
        });
    }
    Ok(Value::Int(x as i64))
}

// ── list ──────────────────────────────────────────────────────────────────────

fn list_module() -> Module {
    HashMap::from([
        ("length", list_length as BuiltinFn),
        ("append", list_append),
        ("at", list_at),
        ("contains", list_contains),
    ])
}

fn list_length(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "list.length", "list")?;
    Ok(Value::Int(list_arg(args, "list.length")?.len() as i64))
}

fn list_append(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "list.append", "list and item")?;
    let mut items = list_arg(args, "list.append")?.to_vec();
    items.push(args[1].clone());
    Ok(Value::List(items))
}

fn list_at(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "list.at", "list and index")?;
    let items = list_arg(args, "list.at")?;
    let index = number(&args[1], "list.at")? as i64;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(BuiltinError::OutOfBounds { func: "list.at", index })
}

/// Membership by stringified comparison; a non-list haystack holds nothing.
fn list_contains(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "list.contains", "list and item")?;
    let needle = args[1].to_string();
    let found = match &args[0] {
        Value::List(items) => items.iter().any(|x| x.to_string() == needle),
        _ => false,
    };
    Ok(Value::Bool(found))
}

// ── dict ──────────────────────────────────────────────────────────────────────

fn dict_module() -> Module {
    HashMap::from([
        ("get", dict_get as BuiltinFn),
        ("set", dict_set),
        ("keys", dict_keys),
        ("values", dict_values),
        ("has", dict_has),
    ])
}

fn dict_get(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "dict.get", "dict and key")?;
    let map = map_arg(args, "dict.get")?;
    let key = text(args, 1);
    map.get(&key).cloned().ok_or(BuiltinError::MissingKey(key))
}

/// Returns the updated dict; a non-dict first argument starts a new one.
fn dict_set(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 3, "dict.set", "dict, key, and value")?;
    let mut map = match &args[0] {
        Value::Map(map) => map.clone(),
        _ => Default::default(),
    };
    map.insert(text(args, 1), args[2].clone());
    Ok(Value::Map(map))
}

fn dict_keys(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "dict.keys", "dict")?;
    let map = map_arg(args, "dict.keys")?;
    Ok(Value::List(map.keys().map(|k| Value::Str(k.clone())).collect()))
}

fn dict_values(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "dict.values", "dict")?;
    let map = map_arg(args, "dict.values")?;
    Ok(Value::List(map.values().cloned().collect()))
}

fn dict_has(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "dict.has", "dict and key")?;
    let map = map_arg(args, "dict.has")?;
    Ok(Value::Bool(map.contains_key(&text(args, 1))))
}

// ── time ──────────────────────────────────────────────────────────────────────

fn time_module() -> Module {
    HashMap::from([
        ("now", time_now as BuiltinFn),
        ("timestamp", time_timestamp),
        ("sleep", time_sleep),
        ("format", time_format),
    ])
}

fn time_now(_args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::Str(Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)))
}

fn time_timestamp(_args: &[Value]) -> Result<Value, BuiltinError> {
    Ok(Value::Int(Utc::now().timestamp()))
}

fn time_sleep(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "time.sleep", "milliseconds")?;
    let ms = number(&args[0], "time.sleep")?.max(0.0) as u64;
    std::thread::sleep(Duration::from_millis(ms));
    Ok(Value::Absent)
}

/// `format(ts, layout)` with a strftime layout, in local time.
fn time_format(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 2, "time.format", "timestamp and layout")?;
    let ts = number(&args[0], "time.format")? as i64;
    let layout = text(args, 1);

    let items: Vec<Item<'_>> = StrftimeItems::new(&layout).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(BuiltinError::Format(format!("invalid layout '{layout}'")));
    }
    let dt = DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| BuiltinError::Format(format!("timestamp {ts} out of range")))?
        .with_timezone(&Local);

    let mut out = String::new();
    write!(out, "{}", dt.format_with_items(items.iter()))
        .map_err(|_| BuiltinError::Format(format!("cannot render '{layout}'")))?;
    Ok(Value::Str(out))
}

// ── json ──────────────────────────────────────────────────────────────────────

fn json_module() -> Module {
    HashMap::from([
        ("parse", json_parse as BuiltinFn),
        ("stringify", json_stringify),
    ])
}

fn json_parse(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "json.parse", "string")?;
    let json: serde_json::Value = serde_json::from_str(&text(args, 0))?;
    Ok(Value::from_json(json))
}

fn json_stringify(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "json.stringify", "value")?;
    Ok(Value::Str(serde_json::to_string(&args[0].to_json())?))
}

// ── path ──────────────────────────────────────────────────────────────────────

fn path_module() -> Module {
    HashMap::from([
        ("join", path_join as BuiltinFn),
        ("dir", path_dir),
        ("base", path_base),
        ("ext", path_ext),
        ("exists", path_exists),
    ])
}

fn path_join(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "path.join", "at least one path")?;
    let mut joined = PathBuf::new();
    for part in args.iter().map(Value::to_string).filter(|p| !p.is_empty()) {
        joined.push(part);
    }
    Ok(Value::Str(joined.display().to_string()))
}

fn path_dir(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "path.dir", "path")?;
    Ok(Value::Str(dir_of(&text(args, 0))))
}

fn path_base(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "path.base", "path")?;
    Ok(Value::Str(base_of(&text(args, 0))))
}

/// Extension including the leading dot, or empty.
fn path_ext(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "path.ext", "path")?;
    let ext = Path::new(&text(args, 0))
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok(Value::Str(ext))
}

fn path_exists(args: &[Value]) -> Result<Value, BuiltinError> {
    expect_args(args, 1, "path.exists", "path")?;
    Ok(Value::Bool(Path::new(&text(args, 0)).exists()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
