/*!
Consumers of decode events.

A [`Visitor`] receives one call per CBOR item the [`Decoder`] recognises.
Every method fails with [`Error::UnexpectedShape`] unless overridden, so a
consumer that only expects, say, an unsigned integer implements the
`visit_u*` methods and any other input is rejected without coercion.

Containers are reported in two steps: `visit_array(len)` (or `visit_map`)
announces the container, then the decoder calls `visit_array_element` once
per element (or `visit_map_entry` once per pair). The visitor must decode
exactly one item per element, and two per entry, by calling
[`Decoder::parse`], typically with itself.
*/

use super::decode::{Decoder, Error};
use super::value::{Map, Value};
use alloc::{string::String, vec::Vec};

pub trait Visitor {
    fn visit_u8(&mut self, _v: u8) -> Result<(), Error> {
        Err(Error::UnexpectedShape("u8"))
    }

    fn visit_u16(&mut self, _v: u16) -> Result<(), Error> {
        Err(Error::UnexpectedShape("u16"))
    }

    fn visit_u32(&mut self, _v: u32) -> Result<(), Error> {
        Err(Error::UnexpectedShape("u32"))
    }

    fn visit_u64(&mut self, _v: u64) -> Result<(), Error> {
        Err(Error::UnexpectedShape("u64"))
    }

    /// Negative integer with a magnitude encoded in the initial byte.
    fn visit_i8(&mut self, _v: i8) -> Result<(), Error> {
        Err(Error::UnexpectedShape("i8"))
    }

    /// Negative integer with a one-byte magnitude.
    fn visit_i16(&mut self, _v: i16) -> Result<(), Error> {
        Err(Error::UnexpectedShape("i16"))
    }

    /// Negative integer with a two-byte magnitude.
    fn visit_i32(&mut self, _v: i32) -> Result<(), Error> {
        Err(Error::UnexpectedShape("i32"))
    }

    /// Negative integer with a four or eight-byte magnitude.
    fn visit_i64(&mut self, _v: i64) -> Result<(), Error> {
        Err(Error::UnexpectedShape("i64"))
    }

    /// Half and single-precision floats.
    fn visit_f32(&mut self, _v: f32) -> Result<(), Error> {
        Err(Error::UnexpectedShape("f32"))
    }

    fn visit_f64(&mut self, _v: f64) -> Result<(), Error> {
        Err(Error::UnexpectedShape("f64"))
    }

    fn visit_bool(&mut self, _v: bool) -> Result<(), Error> {
        Err(Error::UnexpectedShape("bool"))
    }

    /// Both `null` and `undefined`.
    fn visit_null(&mut self) -> Result<(), Error> {
        Err(Error::UnexpectedShape("null"))
    }

    fn visit_bytes(&mut self, _v: &[u8]) -> Result<(), Error> {
        Err(Error::UnexpectedShape("byte string"))
    }

    fn visit_string(&mut self, _v: &str) -> Result<(), Error> {
        Err(Error::UnexpectedShape("text string"))
    }

    fn visit_array(&mut self, _len: usize) -> Result<(), Error> {
        Err(Error::UnexpectedShape("array"))
    }

    fn visit_array_element(
        &mut self,
        _decoder: &mut Decoder<'_>,
        _index: usize,
    ) -> Result<(), Error> {
        Err(Error::UnexpectedShape("array element"))
    }

    fn visit_map(&mut self, _len: usize) -> Result<(), Error> {
        Err(Error::UnexpectedShape("map"))
    }

    fn visit_map_entry(&mut self, _decoder: &mut Decoder<'_>) -> Result<(), Error> {
        Err(Error::UnexpectedShape("map entry"))
    }
}

/// Most slots reserved for a container before any of its elements decode.
///
/// Declared lengths are only bounded by the remaining input, so a chain of
/// nested headers could otherwise reserve far more memory than the input
/// holds. Containers grow past this as elements arrive.
pub(crate) const PRESIZE_LIMIT: usize = 32;

/// Builds a [`Value`] tree from any well-formed input.
///
/// Completed items and in-progress containers share one stack: scalars are
/// pushed as leaves, containers are pushed empty and filled in index order
/// as their elements are popped off the top.
#[derive(Debug, Default)]
pub struct ValueVisitor {
    stack: Vec<Value>,
}

impl ValueVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The decoded value, once exactly one complete item has been visited.
    pub fn into_value(mut self) -> Option<Value> {
        if self.stack.len() == 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    fn push(&mut self, value: Value) -> Result<(), Error> {
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, Error> {
        self.stack.pop().ok_or(Error::UnexpectedShape("empty value stack"))
    }
}

impl Visitor for ValueVisitor {
    fn visit_u8(&mut self, v: u8) -> Result<(), Error> {
        self.push(Value::UInt(v.into()))
    }

    fn visit_u16(&mut self, v: u16) -> Result<(), Error> {
        self.push(Value::UInt(v.into()))
    }

    fn visit_u32(&mut self, v: u32) -> Result<(), Error> {
        self.push(Value::UInt(v.into()))
    }

    fn visit_u64(&mut self, v: u64) -> Result<(), Error> {
        self.push(Value::UInt(v))
    }

    fn visit_i8(&mut self, v: i8) -> Result<(), Error> {
        self.push(Value::Int(v.into()))
    }

    fn visit_i16(&mut self, v: i16) -> Result<(), Error> {
        self.push(Value::Int(v.into()))
    }

    fn visit_i32(&mut self, v: i32) -> Result<(), Error> {
        self.push(Value::Int(v.into()))
    }

    fn visit_i64(&mut self, v: i64) -> Result<(), Error> {
        self.push(Value::Int(v))
    }

    fn visit_f32(&mut self, v: f32) -> Result<(), Error> {
        self.push(Value::Float(v.into()))
    }

    fn visit_f64(&mut self, v: f64) -> Result<(), Error> {
        self.push(Value::Float(v))
    }

    fn visit_bool(&mut self, v: bool) -> Result<(), Error> {
        self.push(Value::Boolean(v))
    }

    fn visit_null(&mut self) -> Result<(), Error> {
        self.push(Value::Null)
    }

    fn visit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.push(Value::Bytes(v.to_vec()))
    }

    fn visit_string(&mut self, v: &str) -> Result<(), Error> {
        self.push(Value::String(String::from(v)))
    }

    fn visit_array(&mut self, len: usize) -> Result<(), Error> {
        self.push(Value::Array(Vec::with_capacity(len.min(PRESIZE_LIMIT))))
    }

    fn visit_array_element(
        &mut self,
        decoder: &mut Decoder<'_>,
        index: usize,
    ) -> Result<(), Error> {
        decoder.parse(self)?;
        let item = self.pop()?;
        match self.stack.last_mut() {
            Some(Value::Array(items)) if items.len() == index => {
                items.push(item);
                Ok(())
            }
            Some(Value::Array(_)) => Err(Error::UnexpectedShape("array index")),
            _ => Err(Error::UnexpectedShape("array element")),
        }
    }

    fn visit_map(&mut self, len: usize) -> Result<(), Error> {
        self.push(Value::Map(Map::with_capacity(len.min(PRESIZE_LIMIT))))
    }

    fn visit_map_entry(&mut self, decoder: &mut Decoder<'_>) -> Result<(), Error> {
        decoder.parse(self)?;
        decoder.parse(self)?;
        let value = self.pop()?;
        let key = self.pop()?;
        match self.stack.last_mut() {
            Some(Value::Map(map)) => {
                map.insert(key, value);
                Ok(())
            }
            _ => Err(Error::UnexpectedShape("map entry")),
        }
    }
}
