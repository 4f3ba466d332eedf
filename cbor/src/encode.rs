/*!
Canonical CBOR encoding.

Every header is written in its shortest form, and floats use the narrowest
of binary16, binary32 and binary64 that holds the value exactly.
*/

use super::primitive::Writer;
use super::value::Value;
use alloc::{string::String, vec::Vec};

pub trait ToCbor {
    fn to_cbor(&self, encoder: &mut Encoder);
}

#[derive(Debug, Default)]
pub struct Encoder {
    writer: Writer,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            writer: Writer::with_capacity(capacity),
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    pub fn offset(&self) -> usize {
        self.writer.len()
    }

    /// Writes a major type and its argument using the shortest header.
    ///
    /// The argument is the value itself for integers and the length for
    /// strings and containers.
    pub fn emit_header(&mut self, major: u8, val: u64) {
        debug_assert!(major < 8);
        if val < 24 {
            self.writer.write_u8((major << 5) | (val as u8))
        } else if val <= u8::MAX as u64 {
            self.writer.write_u8((major << 5) | 24u8);
            self.writer.write_u8(val as u8)
        } else if val <= u16::MAX as u64 {
            self.writer.write_u8((major << 5) | 25u8);
            self.writer.write_u16(val as u16)
        } else if val <= u32::MAX as u64 {
            self.writer.write_u8((major << 5) | 26u8);
            self.writer.write_u32(val as u32)
        } else {
            self.writer.write_u8((major << 5) | 27u8);
            self.writer.write_u64(val)
        }
    }

    pub fn emit_raw_slice(&mut self, data: &[u8]) {
        self.writer.write_slice(data)
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        value.to_cbor(self)
    }

    pub fn emit_null(&mut self) {
        self.writer.write_u8((7 << 5) | 22)
    }

    pub fn emit_bytes(&mut self, data: &[u8]) {
        self.emit_length_prefixed(2, data)
    }

    pub fn emit_str(&mut self, data: &str) {
        self.emit_length_prefixed(3, data.as_bytes())
    }

    fn emit_length_prefixed(&mut self, major: u8, data: &[u8]) {
        self.emit_header(major, data.len() as u64);
        self.writer.write_slice(data)
    }

    pub fn emit_array<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Array),
    {
        let mut a = Array::new(self, count);
        f(&mut a);
        a.end()
    }

    pub fn emit_slice<T>(&mut self, values: &[T])
    where
        T: ToCbor,
    {
        let mut a = Array::new(self, values.len());
        for value in values {
            a.emit(value);
        }
        a.end()
    }

    pub fn emit_map<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Map),
    {
        let mut m = Map::new(self, count);
        f(&mut m);
        m.end()
    }

    fn emit_f16(&mut self, v: half::f16) {
        self.writer.write_u8((7 << 5) | 25);
        self.writer.write_f16(v)
    }

    fn emit_f32(&mut self, v: f32) {
        self.writer.write_u8((7 << 5) | 26);
        self.writer.write_f32(v)
    }

    fn emit_f64(&mut self, v: f64) {
        if v.is_nan() {
            // All NaNs collapse to the canonical quiet NaN
            self.emit_f16(half::f16::NAN)
        } else if let Some(f) = lossless_float_coerce::<half::f16>(v) {
            // Also catches both infinities
            self.emit_f16(f)
        } else if let Some(f) = lossless_float_coerce::<f32>(v) {
            self.emit_f32(f)
        } else {
            self.writer.write_u8((7 << 5) | 27);
            self.writer.write_f64(v)
        }
    }
}

/// A definite-length array or map under construction.
///
/// `D` is the number of items per entry: 1 for arrays, 2 for maps.
pub struct Sequence<'a, const D: usize> {
    encoder: &'a mut Encoder,
    count: usize,
    idx: usize,
}

pub type Array<'a> = Sequence<'a, 1>;
pub type Map<'a> = Sequence<'a, 2>;

impl<'a, const D: usize> Sequence<'a, D> {
    fn new(encoder: &'a mut Encoder, count: usize) -> Self {
        encoder.emit_header(if D == 1 { 4 } else { 5 }, count as u64);
        Self {
            encoder,
            count: count * D,
            idx: 0,
        }
    }

    fn next_field(&mut self) -> &mut Encoder {
        self.idx += 1;
        if self.idx > self.count {
            panic!("Too many items added to definite length sequence")
        }
        self.encoder
    }

    fn end(self) {
        if self.idx != self.count {
            panic!(
                "Definite length sequence is short of items: {}, expected {}",
                self.idx, self.count
            );
        }
    }

    pub fn emit<T>(&mut self, value: &T)
    where
        T: ToCbor + ?Sized,
    {
        self.next_field().emit(value)
    }

    pub fn emit_null(&mut self) {
        self.next_field().emit_null()
    }

    pub fn emit_bytes(&mut self, data: &[u8]) {
        self.next_field().emit_bytes(data)
    }

    pub fn emit_array<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.next_field().emit_array(count, f)
    }

    pub fn emit_map<F>(&mut self, count: usize, f: F)
    where
        F: FnOnce(&mut Map),
    {
        self.next_field().emit_map(count, f)
    }
}

macro_rules! impl_uint_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_header(0, *self as u64);
                }
            }
        )*
    };
}

impl_uint_to_cbor!(u8, u16, u32, u64, usize);

fn emit_i64(encoder: &mut Encoder, val: i64) {
    if val >= 0 {
        encoder.emit_header(0, val as u64);
    } else {
        // -(val + 1) cannot overflow, even for i64::MIN
        encoder.emit_header(1, (-(val + 1)) as u64);
    }
}

macro_rules! impl_int_to_cbor {
    ($($ty:ty),*) => {
        $(
            impl ToCbor for $ty {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    emit_i64(encoder, *self as i64)
                }
            }
        )*
    };
}

impl_int_to_cbor!(i8, i16, i32, i64, isize);

/// Narrows `value` to `T` only if no precision is lost.
pub(crate) fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f) == value => Some(f),
        _ => None,
    }
}

impl ToCbor for f64 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_f64(*self)
    }
}

impl ToCbor for f32 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_f64(*self as f64)
    }
}

impl ToCbor for half::f16 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_f16(*self)
    }
}

impl ToCbor for bool {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder
            .writer
            .write_u8((7 << 5) | if *self { 21 } else { 20 })
    }
}

impl ToCbor for str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_str(self)
    }
}

impl ToCbor for &str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_str(self)
    }
}

impl ToCbor for String {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_str(self)
    }
}

impl ToCbor for [u8] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self)
    }
}

impl ToCbor for Vec<u8> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self)
    }
}

impl<const N: usize> ToCbor for [u8; N] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_bytes(self)
    }
}

impl<T> ToCbor for Option<T>
where
    T: ToCbor,
{
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => encoder.emit(value),
            None => encoder.emit_null(),
        }
    }
}

macro_rules! impl_array_to_cbor {
    ($( $value_type:ty),*) => {
        $(
            impl ToCbor for &[$value_type] {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_slice(self)
                }
            }
        )*
    };
}

// Byte slices are byte strings, see above
impl_array_to_cbor!(
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    half::f16,
    f32,
    f64,
    bool,
    String,
    Value
);

impl ToCbor for Value {
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Value::Null => encoder.emit_null(),
            Value::Boolean(v) => encoder.emit(v),
            Value::UInt(v) => encoder.emit_header(0, *v),
            Value::Int(v) => emit_i64(encoder, *v),
            Value::Float(v) => encoder.emit_f64(*v),
            Value::Bytes(v) => encoder.emit_bytes(v),
            Value::String(v) => encoder.emit_str(v),
            Value::Array(items) => encoder.emit_slice(items),
            Value::Map(map) => {
                encoder.emit_map(map.len(), |m| {
                    for (k, v) in map {
                        m.emit(k);
                        m.emit(v);
                    }
                })
            }
        }
    }
}

pub fn emit<T>(value: &T) -> Vec<u8>
where
    T: ToCbor + ?Sized,
{
    let mut e = Encoder::new();
    e.emit(value);
    e.build()
}

/// Canonical encoding of a whole value tree.
pub fn encode(value: &Value) -> Vec<u8> {
    emit(value)
}

pub fn emit_array<F>(count: usize, f: F) -> Vec<u8>
where
    F: FnOnce(&mut Array),
{
    let mut e = Encoder::new();
    e.emit_array(count, f);
    e.build()
}

pub fn emit_map<F>(count: usize, f: F) -> Vec<u8>
where
    F: FnOnce(&mut Map),
{
    let mut e = Encoder::new();
    e.emit_map(count, f);
    e.build()
}
