use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A key of a record or an index entry.
///
/// Keys are totally ordered: numbers sort before strings, strings before arrays. Arrays compare
/// element by element, a shorter array sorts before any longer array it is a prefix of.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Number(f64),
    String(String),
    Array(Vec<KeyValue>),
}

impl KeyValue {
    /// Converts a JSON value into a key. Booleans, `null` and objects are not valid keys.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(number) => number.as_f64().map(KeyValue::Number),
            serde_json::Value::String(string) => Some(KeyValue::String(string.clone())),
            serde_json::Value::Array(elements) => elements
                .iter()
                .map(KeyValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(KeyValue::Array),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            KeyValue::Number(_) => 0,
            KeyValue::String(_) => 1,
            KeyValue::Array(_) => 2,
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // `0.0 == -0.0` but `total_cmp` would tell them apart
            (KeyValue::Number(a), KeyValue::Number(b)) if a == b => Ordering::Equal,
            (KeyValue::Number(a), KeyValue::Number(b)) => a.total_cmp(b),
            (KeyValue::String(a), KeyValue::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (KeyValue::Array(a), KeyValue::Array(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Number(number) => write!(f, "{number}"),
            KeyValue::String(string) => write!(f, "{string:?}"),
            KeyValue::Array(elements) => {
                write!(f, "[")?;
                for (idx, element) in elements.iter().enumerate() {
                    if idx != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyValue {
                fn from(value: $ty) -> Self {
                    KeyValue::Number(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::String(value.to_owned())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::String(value)
    }
}

impl From<Vec<KeyValue>> for KeyValue {
    fn from(value: Vec<KeyValue>) -> Self {
        KeyValue::Array(value)
    }
}

impl<T: Into<KeyValue>, const N: usize> From<[T; N]> for KeyValue {
    fn from(value: [T; N]) -> Self {
        KeyValue::Array(value.into_iter().map(Into::into).collect())
    }
}

/// Where to find a key inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// Dotted path, e.g. `"id"` or `"owner.name"`.
    Single(String),
    /// One path per array element, e.g. `["colour", "make"]`. Yields an array key.
    Compound(Vec<String>),
}

impl KeyPath {
    pub fn extract(&self, record: &serde_json::Value) -> Option<KeyValue> {
        match self {
            KeyPath::Single(path) => extract_path(record, path),
            KeyPath::Compound(paths) => paths
                .iter()
                .map(|path| extract_path(record, path))
                .collect::<Option<Vec<_>>>()
                .map(KeyValue::Array),
        }
    }
}

fn extract_path(record: &serde_json::Value, path: &str) -> Option<KeyValue> {
    let value = if path.is_empty() {
        record
    } else {
        path.split('.')
            .try_fold(record, |value, segment| value.get(segment))?
    };
    KeyValue::from_json(value)
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPath::Single(path) => write!(f, "{path:?}"),
            KeyPath::Compound(paths) => write!(f, "{paths:?}"),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(value: &str) -> Self {
        KeyPath::Single(value.to_owned())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(value: [&str; N]) -> Self {
        KeyPath::Compound(value.iter().map(|path| (*path).to_owned()).collect())
    }
}
