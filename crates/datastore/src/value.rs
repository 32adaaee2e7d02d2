//! Cell values and composite keys.
//!
//! A [Value] is one of 5 kinds: null, a 64-bit signed integer, a float, a string, or anything else JSON can hold
//! (booleans, lists, objects).  Null is what an "empty" cell holds.
//!
//! Values are totally ordered and hashable so that they can be used as key parts.  Integers and floats are both numbers
//! and compare by value, so `1` and `1.0` are the same key part, as they are to sqlite.  Otherwise values of different
//! kinds order by kind first, in the order listed above.
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Integer(i64),
    F64(f64),
    String(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::F64(_) => 1,
            Value::String(_) => 2,
            Value::Json(_) => 3,
        }
    }

    /// Convert from JSON, keeping integers and strings as their own kinds.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    // Too big for i64; keep it exact.
                    Value::Json(serde_json::Value::Number(n))
                } else {
                    n.as_f64().map(Value::from).unwrap_or(Value::Null)
                }
            }
            other => Value::Json(other),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => (*i).into(),
            Value::F64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Json(j) => j.clone(),
        }
    }
}

/// Zero has one sign as far as we're concerned; otherwise `0 == 0.0 == -0.0` wouldn't be transitive.
fn unsigned_zero(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

fn cmp_integer_f64(i: i64, f: f64) -> Ordering {
    let f = unsigned_zero(f);
    // The nearest float to `i` orders the same way `i` does against any other float; only a tie needs exact
    // comparison, and a tie means `f` is integral and at most 2^63 in magnitude, which i128 holds.
    match (i as f64).total_cmp(&f) {
        Ordering::Equal => (i as i128).cmp(&(f as i128)),
        o => o,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::F64(a), Value::F64(b)) => unsigned_zero(*a).total_cmp(&unsigned_zero(*b)),
            (Value::Integer(a), Value::F64(b)) => cmp_integer_f64(*a, *b),
            (Value::F64(a), Value::Integer(b)) => cmp_integer_f64(*b, *a).reverse(),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            // serde_json's maps are sorted, so the text form is canonical.
            (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            // Floats equal to an integer hash like it.
            Value::F64(f) => match integral_f64(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            Value::String(s) => s.hash(state),
            Value::Json(j) => j.to_string().hash(state),
        }
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    let f = unsigned_zero(f);
    // 2^63 itself isn't an i64.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::F64(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Integer(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Value {
        Value::Integer(i.into())
    }
}

/// NaN becomes null: it has no JSON form and sqlite stores it as NULL anyway.
impl From<f64> for Value {
    fn from(f: f64) -> Value {
        if f.is_nan() {
            Value::Null
        } else {
            Value::F64(f)
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Json(serde_json::Value::Bool(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Value {
        o.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The composite key of a row: one value per key column, in declared order.
///
/// Most tables have a handful of key columns, so the parts live inline.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Key(SmallVec<[Value; 4]>);

impl Key {
    pub fn new(parts: impl IntoIterator<Item = Value>) -> Key {
        Key(parts.into_iter().collect())
    }

    pub fn parts(&self) -> &[Value] {
        &self.0[..]
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl<V: Into<Value>> FromIterator<V> for Key {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Key {
        Key(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;

        write!(f, "({})", self.0.iter().join(", "))
    }
}

/// Build a [Key] from values of mixed types: `key![1, "a"]`.
#[macro_export]
macro_rules! key {
    ($($part:expr),* $(,)?) => {
        $crate::Key::new([$($crate::Value::from($part)),*])
    };
}
