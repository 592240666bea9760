//! Runtime value type for the Athera scripting language.
//!
//! Athera is dynamically typed; values are produced by the expression
//! evaluator and the builtin modules, and every coercion happens at the point
//! of use.

use std::collections::BTreeMap;
use std::fmt;

/// An Athera runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    #[default]
    Absent,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Absent => write!(f, "nil"),
        }
    }
}

impl Value {
    /// Truthiness used by `check`: booleans as-is, numbers nonzero,
    /// strings and lists non-empty.  Maps and `Absent` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(_) | Value::Absent => false,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Numeric view of the value.  Strings are parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Name of the variant, used in warnings and fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Absent => "nil",
        }
    }

    // ── Conversion to/from JSON ──────────────────────────────────────────────

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Absent => serde_json::Value::Null,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_scalars() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(3.5).to_string(), "3.5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("hello".into()).to_string(), "hello");
        assert_eq!(Value::Absent.to_string(), "nil");
    }

    #[test]
    fn display_containers() {
        let list = Value::List(vec![Value::Int(1), "a".into(), Value::Bool(false)]);
        assert_eq!(list.to_string(), "[1, a, false]");

        let mut map = BTreeMap::new();
        map.insert("b".to_owned(), Value::Int(2));
        map.insert("a".to_owned(), Value::Int(1));
        assert_eq!(Value::Map(map).to_string(), "{a: 1, b: 2}");
    }

    #[test]
    fn truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::List(vec![Value::Absent]).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
        assert!(!Value::Absent.is_truthy());
    }

    #[test]
    fn as_number_coercions() {
        assert_eq!(Value::Int(5).as_number(), Some(5.0));
        assert_eq!(Value::Str(" 2.5 ".into()).as_number(), Some(2.5));
        assert_eq!(Value::Str("abc".into()).as_number(), None);
        assert_eq!(Value::Bool(true).as_number(), None);
    }

    #[test]
    fn json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"n": 3, "x": 1.5, "tags": ["a", null]}"#).unwrap();
        let v = Value::from_json(json);
        let Value::Map(map) = &v else { panic!("expected map, got {v:?}") };
        assert_eq!(map["n"], Value::Int(3));
        assert_eq!(map["x"], Value::Float(1.5));
        assert_eq!(map["tags"], Value::List(vec!["a".into(), Value::Absent]));
        assert_eq!(v.to_json().to_string(), r#"{"n":3,"tags":["a",null],"x":1.5}"#);
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = "hi".into();
        assert_eq!(v, Value::Str("hi".into()));
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));
    }
}
