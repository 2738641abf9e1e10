//! Runtime value type for the command language.
//!
//! Values are what command handlers receive and return and what variables
//! hold.  Integers are 128-bit so that sign-invariant 64-bit types can carry
//! the full union of the signed and unsigned ranges.

use std::cmp::Ordering;
use std::fmt;

use crate::error::CliError;

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Reference to a host object by its canonical name.
    Object(String),
    /// Address with an address-space prefix (`p:`, `v:`, ...; empty for none).
    Address { space: String, offset: i128 },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.repr()),
        }
    }
}

impl Value {
    /// Source-like rendering: strings quoted, lists bracketed.
    pub fn repr(&self) -> String {
        match self {
            Value::Nil => "NIL".to_owned(),
            Value::Bool(true) => "TRUE".to_owned(),
            Value::Bool(false) => "FALSE".to_owned(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{x:.1}")
                } else {
                    format!("{x}")
                }
            }
            Value::Str(s) => quote(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Object(name) => name.clone(),
            Value::Address { space, offset } if space.is_empty() => format!("{offset:#x}"),
            Value::Address { space, offset } => format!("{space}:{offset:#x}"),
        }
    }

    /// Truthiness used by `if`, `while`, `and`, `or` and `not`.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Object(_) | Value::Address { .. } => true,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Address { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Object(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Address { .. } => "address",
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    fn numeric_pair(&self, rhs: &Value, op: &str) -> Result<Num, CliError> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Num::Int(*a, *b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Num::Float(x, y)),
                _ => Err(operand_error(op, self, rhs)),
            },
        }
    }

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, CliError> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::Address { space, offset }, Value::Int(n)) => Ok(Value::Address {
                space: space.clone(),
                offset: checked(offset.checked_add(*n))?,
            }),
            _ => match self.numeric_pair(rhs, "+")? {
                Num::Int(a, b) => Ok(Value::Int(checked(a.checked_add(b))?)),
                Num::Float(a, b) => Ok(Value::Float(a + b)),
            },
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, CliError> {
        match self.numeric_pair(rhs, "-")? {
            Num::Int(a, b) => Ok(Value::Int(checked(a.checked_sub(b))?)),
            Num::Float(a, b) => Ok(Value::Float(a - b)),
        }
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, CliError> {
        match self.numeric_pair(rhs, "*")? {
            Num::Int(a, b) => Ok(Value::Int(checked(a.checked_mul(b))?)),
            Num::Float(a, b) => Ok(Value::Float(a * b)),
        }
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, CliError> {
        match self.numeric_pair(rhs, "/")? {
            Num::Int(_, 0) => Err(CliError::Value("division by zero".into())),
            Num::Int(a, b) => Ok(Value::Int(checked(a.checked_div_euclid(b))?)),
            Num::Float(_, b) if b == 0.0 => Err(CliError::Value("division by zero".into())),
            Num::Float(a, b) => Ok(Value::Float(a / b)),
        }
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, CliError> {
        match self.numeric_pair(rhs, "%")? {
            Num::Int(_, 0) => Err(CliError::Value("modulo by zero".into())),
            Num::Int(a, b) => Ok(Value::Int(checked(a.checked_rem_euclid(b))?)),
            Num::Float(_, b) if b == 0.0 => Err(CliError::Value("modulo by zero".into())),
            Num::Float(a, b) => Ok(Value::Float(a.rem_euclid(b))),
        }
    }

    /// Integer-only binary operation (`&`, `|`, `^`, `<<`, `>>`).
    pub fn bitwise(&self, rhs: &Value, op: &str) -> Result<Value, CliError> {
        let (Value::Int(a), Value::Int(b)) = (self, rhs) else {
            return Err(operand_error(op, self, rhs));
        };
        let (a, b) = (*a, *b);
        let shift = || u32::try_from(b).ok().filter(|s| *s < 128);
        let out = match op {
            "&" => a & b,
            "|" => a | b,
            "^" => a ^ b,
            "<<" => checked(shift().and_then(|s| a.checked_shl(s)))?,
            ">>" => checked(shift().and_then(|s| a.checked_shr(s)))?,
            _ => return Err(operand_error(op, self, rhs)),
        };
        Ok(Value::Int(out))
    }

    // ── Comparison ────────────────────────────────────────────────────────────

    /// Equality with numeric cross-type comparison (`1 == 1.0`).
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                self.as_float() == rhs.as_float()
            }
            (Value::Object(a), Value::Str(b)) | (Value::Str(a), Value::Object(b)) => a == b,
            _ => self == rhs,
        }
    }

    /// Ordering between comparable values.
    pub fn compare(&self, rhs: &Value) -> Result<Ordering, CliError> {
        let ord = match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Address { offset: a, .. }, Value::Address { offset: b, .. }) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        };
        ord.ok_or_else(|| operand_error("compare", self, rhs))
    }
}

enum Num {
    Int(i128, i128),
    Float(f64, f64),
}

fn checked(v: Option<i128>) -> Result<i128, CliError> {
    v.ok_or_else(|| CliError::Value("integer overflow".into()))
}

fn operand_error(op: &str, a: &Value, b: &Value) -> CliError {
    CliError::Type(format!(
        "cannot apply '{op}' to {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

/// Double-quote `s`, escaping the characters the tokenizer unescapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(i128::from(n))
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i128)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
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
    fn display_and_repr() {
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        assert_eq!(Value::Str("hi".into()).repr(), "\"hi\"");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "NIL");
        let l = Value::List(vec![Value::Int(1), "a".into(), Value::Bool(true)]);
        assert_eq!(l.to_string(), "[1, \"a\", TRUE]");
        let a = Value::Address { space: "p".into(), offset: 0x1000 };
        assert_eq!(a.to_string(), "p:0x1000");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.as_bool());
        assert!(!Value::Int(0).as_bool());
        assert!(Value::Int(-1).as_bool());
        assert!(!Value::Str(String::new()).as_bool());
        assert!(!Value::List(vec![]).as_bool());
        assert!(Value::Object("cpu0".into()).as_bool());
    }

    #[test]
    fn add_mixes_ints_and_floats() {
        assert_eq!(Value::Int(2).arith_add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(Value::Int(2).arith_add(&Value::Float(0.5)).unwrap(), Value::Float(2.5));
        assert_eq!(
            Value::from("ab").arith_add(&Value::from("cd")).unwrap(),
            Value::from("abcd")
        );
    }

    #[test]
    fn add_rejects_string_and_int() {
        let err = Value::from("a").arith_add(&Value::Int(1)).unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn division_by_zero_is_a_value_error() {
        assert!(matches!(
            Value::Int(1).arith_div(&Value::Int(0)),
            Err(CliError::Value(_))
        ));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(Value::Int(i128::MAX).arith_add(&Value::Int(1)).is_err());
        let min = Value::Int(i128::MIN);
        assert!(matches!(min.arith_div(&Value::Int(-1)), Err(CliError::Value(m)) if m == "integer overflow"));
        assert!(matches!(min.arith_rem(&Value::Int(-1)), Err(CliError::Value(m)) if m == "integer overflow"));
    }

    #[test]
    fn bitwise_ops() {
        assert_eq!(Value::Int(6).bitwise(&Value::Int(3), "&").unwrap(), Value::Int(2));
        assert_eq!(Value::Int(1).bitwise(&Value::Int(4), "<<").unwrap(), Value::Int(16));
        assert!(Value::Float(1.0).bitwise(&Value::Int(1), "|").is_err());
    }

    #[test]
    fn comparisons() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert_eq!(Value::Int(1).compare(&Value::Float(2.0)).unwrap(), Ordering::Less);
        assert!(Value::Int(1).compare(&Value::from("x")).is_err());
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    }
}
