/*!
The generic, self-describing CBOR value tree.

A [`Value`] owns all of its children. Numbers compare by value across the
`UInt`, `Int` and `Float` representations, but only when the conversion
between them is exact: `UInt(1) == Float(1.0)`, while `UInt(u64::MAX)` is
never equal to the nearest `f64`.
*/

use alloc::{string::String, vec::Vec};
use core::hash::{BuildHasher, Hash, Hasher};
use foldhash::fast::RandomState;
use hashbrown::HashTable;

/// Any decoded CBOR data item.
#[derive(Clone)]
pub enum Value {
    /// Both `null` and `undefined`.
    Null,
    Boolean(bool),
    /// Non-negative integers, up to `u64::MAX`.
    UInt(u64),
    /// Negative integers.
    Int(i64),
    /// Floats of every wire width, widened to `f64`.
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn from_null() -> Self {
        Self::Null
    }

    pub fn from_bool(v: bool) -> Self {
        Self::Boolean(v)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::UInt(v)
    }

    pub fn from_i64(v: i64) -> Self {
        Self::Int(v)
    }

    pub fn from_f64(v: f64) -> Self {
        Self::Float(v)
    }

    pub fn from_bytes(v: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(v.into())
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    pub fn from_array(v: impl Into<Vec<Value>>) -> Self {
        Self::Array(v.into())
    }

    pub fn from_map(v: impl Into<Map>) -> Self {
        Self::Map(v.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::UInt(_) => "Unsigned Integer",
            Self::Int(_) => "Negative Integer",
            Self::Float(_) => "Float",
            Self::Bytes(_) => "Byte String",
            Self::String(_) => "Text String",
            Self::Array(_) => "Array",
            Self::Map(_) => "Map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::UInt(_) | Self::Int(_) | Self::Float(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a `u64`, if it is a number that converts exactly.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Float(v) => exact_f64_to_u64(*v),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is a number that converts exactly.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Int(v) => Some(*v),
            Self::Float(v) => exact_f64_to_i64(*v),
            _ => None,
        }
    }

    /// The value as an `f64`, if it is a number that converts exactly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::UInt(v) => {
                let f = *v as f64;
                (exact_f64_to_u64(f) == Some(*v)).then_some(f)
            }
            Self::Int(v) => {
                let f = *v as f64;
                (exact_f64_to_i64(f) == Some(*v)).then_some(f)
            }
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }
}

// 2^64 and 2^63 are exactly representable, so the range checks below are exact.
const TWO_POW_64: f64 = 18446744073709551616.0;
const TWO_POW_63: f64 = 9223372036854775808.0;

fn exact_f64_to_u64(v: f64) -> Option<u64> {
    if v.is_finite() && v >= 0.0 && v < TWO_POW_64 && v == integral(v) {
        Some(v as u64)
    } else {
        None
    }
}

fn exact_f64_to_i64(v: f64) -> Option<i64> {
    if v.is_finite() && v >= -TWO_POW_63 && v < TWO_POW_63 && v == integral(v) {
        Some(v as i64)
    } else {
        None
    }
}

// `f64::trunc` lives in std; in-range casts truncate toward zero.
fn integral(v: f64) -> f64 {
    if v >= TWO_POW_63 || v <= -TWO_POW_63 {
        // Every f64 this large is already an integer
        v
    } else {
        (v as i64) as f64
    }
}

fn numeric_eq(a: &Value, b: &Value) -> Option<bool> {
    Some(match (a, b) {
        (Value::UInt(a), Value::UInt(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::UInt(u), Value::Int(i)) | (Value::Int(i), Value::UInt(u)) => {
            u64::try_from(*i) == Ok(*u)
        }
        (Value::UInt(u), Value::Float(f)) | (Value::Float(f), Value::UInt(u)) => {
            exact_f64_to_u64(*f) == Some(*u)
        }
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            exact_f64_to_i64(*f) == Some(*i)
        }
        _ => return None,
    })
}

fn contains_nan(v: &Value) -> bool {
    match v {
        Value::Float(f) => f.is_nan(),
        Value::Array(items) => items.iter().any(contains_nan),
        Value::Map(map) => map.iter().any(|(k, v)| contains_nan(k) || contains_nan(v)),
        _ => false,
    }
}

// Hashes agree with `PartialEq`: exactly integral numbers hash as the same
// `i128` whichever variant holds them, and map entries combine
// order-independently.
fn key_hash(hasher: &RandomState, key: &Value) -> u64 {
    let mut state = hasher.build_hasher();
    match key {
        Value::Null => 0u8.hash(&mut state),
        Value::Boolean(v) => (1u8, v).hash(&mut state),
        Value::UInt(v) => (2u8, i128::from(*v)).hash(&mut state),
        Value::Int(v) => (2u8, i128::from(*v)).hash(&mut state),
        Value::Float(v) => match exact_f64_to_i64(*v)
            .map(i128::from)
            .or_else(|| exact_f64_to_u64(*v).map(i128::from))
        {
            Some(n) => (2u8, n).hash(&mut state),
            None => (3u8, v.to_bits()).hash(&mut state),
        },
        Value::Bytes(v) => (4u8, v.as_slice()).hash(&mut state),
        Value::String(v) => (5u8, v.as_str()).hash(&mut state),
        Value::Array(items) => {
            (6u8, items.len()).hash(&mut state);
            for item in items {
                key_hash(hasher, item).hash(&mut state);
            }
        }
        Value::Map(map) => {
            let entries = map.iter().fold(0u64, |acc, (k, v)| {
                acc.wrapping_add(hasher.hash_one((key_hash(hasher, k), key_hash(hasher, v))))
            });
            (7u8, map.len(), entries).hash(&mut state);
        }
    }
    state.finish()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let Some(eq) = numeric_eq(self, other) {
            return eq;
        }
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => {
                f.write_str("h'")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("'")
            }
            Self::String(v) => write!(f, "{v:?}"),
            Self::Array(v) => f.debug_list().entries(v).finish(),
            Self::Map(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident as $target:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )*
    };
}

impl_value_from!(
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64
);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Map(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Key/value pairs with unique keys, in insertion order.
///
/// Entries live in a `Vec`; a hash index over a normalised form of each key
/// makes `insert` and `get` O(1). Numbers that compare equal hash equally
/// whatever their representation. Keys containing NaN are never equal to
/// anything, so they are stored but never indexed.
#[derive(Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
    index: HashTable<usize>,
    hasher: RandomState,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashTable::with_capacity(capacity),
            hasher: RandomState::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_hash(&self, key: &Value) -> Option<u64> {
        (!contains_nan(key)).then(|| key_hash(&self.hasher, key))
    }

    /// Inserts a pair, replacing the value of an equal key in place.
    ///
    /// Returns the previous value if the key was already present.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let Some(hash) = self.index_hash(&key) else {
            self.entries.push((key, value));
            return None;
        };
        if let Some(&i) = self.index.find(hash, |&i| self.entries[i].0 == key) {
            return Some(core::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert_unique(hash, self.entries.len(), |&i| {
            key_hash(&self.hasher, &self.entries[i].0)
        });
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        let hash = self.index_hash(key)?;
        self.index
            .find(hash, |&i| self.entries[i].0 == *key)
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, (Value, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl core::fmt::Debug for Map {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut m = Map::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

impl From<Vec<(Value, Value)>> for Map {
    fn from(v: Vec<(Value, Value)>) -> Self {
        v.into_iter().collect()
    }
}

impl<const N: usize> From<[(Value, Value); N]> for Map {
    fn from(v: [(Value, Value); N]) -> Self {
        v.into_iter().collect()
    }
}

impl IntoIterator for Map {
    type Item = (Value, Value);
    type IntoIter = alloc::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = &'a (Value, Value);
    type IntoIter = core::slice::Iter<'a, (Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::{format, vec};

    #[test]
    fn cross_numeric_equality() {
        assert_eq!(Value::from_u64(1), Value::from_i64(1));
        assert_eq!(Value::from_u64(1), Value::from_f64(1.0));
        assert_eq!(Value::from_i64(1), Value::from_f64(1.0));
        assert_ne!(Value::from_u64(2), Value::from_i64(1));
        assert_eq!(Value::from_i64(-3), Value::from_f64(-3.0));
        assert_ne!(Value::from_i64(-1), Value::from_u64(u64::MAX));
        assert_ne!(Value::from_u64(1), Value::from_f64(1.5));
        assert_ne!(Value::from_u64(1), Value::from_bool(true));
    }

    #[test]
    fn lossy_float_comparisons_fail() {
        // u64::MAX rounds up to 2^64 as an f64
        assert_ne!(Value::from_u64(u64::MAX), Value::from_f64(u64::MAX as f64));
        // 2^53 + 1 is not representable
        let odd = (1u64 << 53) + 1;
        assert_ne!(Value::from_u64(odd), Value::from_f64(odd as f64));
        assert_eq!(Value::from_u64(odd).as_f64(), None);
        assert_eq!(Value::from_u64(1 << 53).as_f64(), Some(9007199254740992.0));
        assert_eq!(Value::from_i64(i64::MIN), Value::from_f64(-9223372036854775808.0));
        assert_ne!(Value::from_i64(i64::MAX), Value::from_f64(i64::MAX as f64));
        assert_ne!(Value::from_u64(0), Value::from_f64(f64::NAN));
        assert_ne!(Value::from_u64(0), Value::from_f64(f64::INFINITY));
    }

    #[test]
    fn exact_accessors() {
        assert_eq!(Value::from_f64(42.0).as_u64(), Some(42));
        assert_eq!(Value::from_f64(-42.0).as_u64(), None);
        assert_eq!(Value::from_f64(-42.0).as_i64(), Some(-42));
        assert_eq!(Value::from_f64(0.5).as_i64(), None);
        assert_eq!(Value::from_f64(1e300).as_u64(), None);
        assert_eq!(Value::from_u64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from_i64(-1).as_u64(), None);
        assert_eq!(Value::from_string("x").as_u64(), None);
        assert!(Value::from_null().is_null());
        assert!(Value::from_f64(0.0).is_number());
        assert!(!Value::from_bytes(vec![1]).is_number());
    }

    #[test]
    fn deep_equality() {
        let a = Value::from_array(vec![
            Value::from_u64(1),
            Value::from_array(vec![Value::from_string("a"), Value::from_null()]),
        ]);
        let b = Value::from_array(vec![
            Value::from_f64(1.0),
            Value::from_array(vec![Value::from_string("a"), Value::from_null()]),
        ]);
        assert_eq!(a, b);

        let reversed = Value::from_array(vec![
            Value::from_array(vec![Value::from_string("a"), Value::from_null()]),
            Value::from_u64(1),
        ]);
        assert_ne!(a, reversed);
        assert_ne!(a, Value::from_array(vec![Value::from_u64(1)]));
    }

    #[test]
    fn map_equality_ignores_order() {
        let a = Value::from_map([
            (Value::from_u64(1), Value::from_u64(2)),
            (Value::from_u64(3), Value::from_u64(4)),
        ]);
        let b = Value::from_map([
            (Value::from_u64(3), Value::from_u64(4)),
            (Value::from_i64(1), Value::from_u64(2)),
        ]);
        assert_eq!(a, b);

        let c = Value::from_map([
            (Value::from_u64(1), Value::from_u64(2)),
            (Value::from_u64(3), Value::from_u64(5)),
        ]);
        assert_ne!(a, c);
        assert_ne!(a, Value::from_map(Map::new()));
    }

    #[test]
    fn map_last_write_wins() {
        let mut m = Map::new();
        assert!(m.insert(Value::from("a"), Value::from(1u8)).is_none());
        assert!(m.insert(Value::from("b"), Value::from(2u8)).is_none());
        assert_eq!(
            m.insert(Value::from("a"), Value::from(3u8)),
            Some(Value::from(1u8))
        );
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&Value::from("a")), Some(&Value::from(3u8)));
        // Insertion order survives the overwrite
        assert_eq!(
            m.keys().cloned().collect::<alloc::vec::Vec<_>>(),
            vec![Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn map_index_normalises_numbers() {
        let mut m = Map::new();
        m.insert(Value::UInt(1), Value::from("uint"));
        assert_eq!(
            m.insert(Value::Float(1.0), Value::from("float")),
            Some(Value::from("uint"))
        );
        m.insert(Value::Int(-1), Value::from("int"));
        assert!(m.insert(Value::Float(-1.0), Value::Null).is_some());
        assert!(m.insert(Value::Float(1.5), Value::Null).is_none());
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(&Value::Int(1)), Some(&Value::from("float")));
        assert_eq!(m.get(&Value::UInt(u64::MAX)), None);

        // Containers hash through their elements
        m.insert(Value::Array(vec![Value::UInt(1)]), Value::from(1u8));
        let ones = Value::Array(vec![Value::Float(1.0)]);
        assert!(m.insert(ones, Value::from(2u8)).is_some());
        let a = Map::from([
            (Value::from("x"), Value::UInt(0)),
            (Value::from("y"), Value::Null),
        ]);
        let b = Map::from([
            (Value::from("y"), Value::Null),
            (Value::from("x"), Value::Float(0.0)),
        ]);
        m.insert(Value::Map(a), Value::from(1u8));
        assert!(m.insert(Value::Map(b), Value::from(2u8)).is_some());
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn map_nan_keys_never_match() {
        let mut m = Map::new();
        assert!(m.insert(Value::Float(f64::NAN), Value::from(1u8)).is_none());
        assert!(m.insert(Value::Float(f64::NAN), Value::from(2u8)).is_none());
        let nested = Value::Array(vec![Value::Float(f64::NAN)]);
        assert!(m.insert(nested.clone(), Value::Null).is_none());
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(&Value::Float(f64::NAN)), None);
        assert!(!m.contains_key(&nested));
    }

    #[test]
    fn debug_format() {
        let v = Value::from_array(vec![
            Value::from(1u8),
            Value::from(-2i8),
            Value::from(&[0xdeu8, 0xad][..]),
            Value::from("x"),
            Value::from_map([(Value::from_bool(true), Value::from_null())]),
        ]);
        assert_eq!(format!("{v:?}"), "[1, -2, h'dead', \"x\", {true: null}]");
    }
}
