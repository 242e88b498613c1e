//! The dynamic value model this crate's evaluator operates over: the usual
//! `Null`/`Bool`/`I64`/`F64`/`Str`/`Bytes` scalars, extended with
//! `Array`/`Object` since a template host value needs both (see the
//! stringification table in `eryn_render`'s `RenderValue`).

use indexmap::IndexMap;

use eryn_render::{LoopIterable, RenderValue};

/// A host value: the thing `context`, `local`, `shared`, and every
/// evaluated expression carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    #[must_use]
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// Looks up `key` on an object, or indexes an array by its decimal
    /// parse, returning `None` for anything else (including a present key
    /// with value `Null`, which is indistinguishable from "absent" here —
    /// matching the original bridge's `object.Get(field)` semantics).
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// JS-style truthiness, used by `&&`/`||`/`!` and as the fallback when
    /// a conditional template's result isn't already a `Bool`.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::I64(n) => *n != 0,
            Self::F64(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Structural equality used by `==`/`!=`, tolerant of the `I64`/`F64`
    /// split (so `1 == 1.0` holds, as in JS).
    #[must_use]
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::I64(a), Self::F64(b)) | (Self::F64(b), Self::I64(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }

    /// Total order for `<`/`<=`/`>`/`>=`, defined only for numbers and
    /// strings (anything else compares as unordered/false).
    #[must_use]
    pub fn partial_compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::I64(a), Self::I64(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.partial_cmp(b),
            _ => self.as_f64().and_then(|a| other.as_f64().and_then(|b| a.partial_cmp(&b))),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I64(n) => Some(*n as f64),
            Self::F64(n) => Some(*n),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::I64(n) => serde_json::Value::from(*n),
            Self::F64(n) => serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::Array(b.iter().map(|byte| serde_json::Value::from(*byte)).collect()),
            Self::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                n.as_i64().map_or_else(|| Self::F64(n.as_f64().unwrap_or_default()), Self::I64)
            }
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl RenderValue for Value {
    fn is_string(&self) -> bool {
        matches!(self, Self::Str(_))
    }
    fn is_buffer(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }
    fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
    fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
    fn is_number(&self) -> bool {
        matches!(self, Self::I64(_) | Self::F64(_))
    }
    fn is_boolean(&self) -> bool {
        matches!(self, Self::Bool(_))
    }
    fn is_nullish(&self) -> bool {
        matches!(self, Self::Null)
    }
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Str(s) => s.as_bytes(),
            Self::Bytes(b) => b,
            _ => &[],
        }
    }
    fn as_number_string(&self) -> String {
        match self {
            Self::I64(n) => n.to_string(),
            Self::F64(n) if n.fract() == 0.0 && n.is_finite() => format!("{n:.0}"),
            Self::F64(n) => n.to_string(),
            _ => String::new(),
        }
    }
    fn as_bool(&self) -> bool {
        self.truthy()
    }
    fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.to_json()).unwrap_or_default()
    }
}

/// Builds the [`LoopIterable`] a `@`/`~` loop iterates: arrays iterate by
/// index with no keys, objects iterate by insertion-ordered key.
#[must_use]
pub fn loop_iterable(value: &Value) -> Option<LoopIterable<Value>> {
    match value {
        Value::Array(items) => Some(LoopIterable { iterable: value.clone(), keys: Vec::new(), is_array: true, length: items.len() }),
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            let length = keys.len();
            Some(LoopIterable { iterable: value.clone(), keys, is_array: false, length })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_stringification_matches_js_style_integers() {
        assert_eq!(Value::F64(3.0).as_number_string(), "3");
        assert_eq!(Value::F64(3.5).as_number_string(), "3.5");
        assert_eq!(Value::I64(-7).as_number_string(), "-7");
    }

    #[test]
    fn loosely_eq_treats_int_and_float_as_equal() {
        assert!(Value::I64(2).loosely_eq(&Value::F64(2.0)));
        assert!(!Value::I64(2).loosely_eq(&Value::F64(2.5)));
    }

    #[test]
    fn field_indexes_arrays_by_decimal_key() {
        let arr = Value::Array(vec![Value::I64(10), Value::I64(20)]);
        assert_eq!(arr.field("1"), Some(&Value::I64(20)));
        assert_eq!(arr.field("x"), None);
    }
}
