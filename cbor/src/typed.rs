/*!
Strongly-typed decoding of primitive Rust types.

Each implementation drives the decoder with a narrow [`Visitor`] that only
accepts the CBOR shapes its type can represent. Integers never come from
floats (or vice versa), and narrowing that would lose information fails
with [`Error::OutOfRange`].
*/

use super::decode::{Decoder, Error};
use super::encode::lossless_float_coerce;
use super::value::Value;
use super::visitor::{PRESIZE_LIMIT, ValueVisitor, Visitor};
use alloc::{string::String, vec::Vec};

pub trait FromCbor: Sized {
    /// Decodes exactly one item from `decoder`.
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error>;

    /// Decodes one item from the front of `data`, returning it and its length.
    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut decoder = Decoder::new(data);
        let value = Self::from_decoder(&mut decoder)?;
        Ok((value, decoder.position()))
    }
}

/// Decodes `data`, which must hold exactly one item of type `T`.
pub fn parse_as<T>(data: &[u8]) -> Result<T, Error>
where
    T: FromCbor,
{
    let mut decoder = Decoder::new(data);
    let value = T::from_decoder(&mut decoder)?;
    decoder.finish()?;
    Ok(value)
}

/// Decodes an array whose elements are all of type `T`.
pub fn decode_array<T>(decoder: &mut Decoder<'_>) -> Result<Vec<T>, Error>
where
    T: FromCbor,
{
    let mut items = ArrayOf(Vec::new());
    decoder.parse(&mut items)?;
    Ok(items.0)
}

struct Slot<T>(Option<T>);

impl<T> Slot<T>
where
    Self: Visitor,
{
    fn parse(decoder: &mut Decoder<'_>) -> Result<T, Error> {
        let mut slot = Self(None);
        decoder.parse(&mut slot)?;
        slot.0.ok_or(Error::UnexpectedEndOfInput)
    }

    fn set(&mut self, v: T) -> Result<(), Error> {
        self.0 = Some(v);
        Ok(())
    }
}

impl Visitor for Slot<u64> {
    fn visit_u8(&mut self, v: u8) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u16(&mut self, v: u16) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u32(&mut self, v: u32) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u64(&mut self, v: u64) -> Result<(), Error> {
        self.set(v)
    }
}

impl Visitor for Slot<i64> {
    fn visit_u8(&mut self, v: u8) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u16(&mut self, v: u16) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u32(&mut self, v: u32) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_u64(&mut self, v: u64) -> Result<(), Error> {
        self.set(i64::try_from(v).map_err(|_| Error::OutOfRange("i64"))?)
    }

    fn visit_i8(&mut self, v: i8) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_i16(&mut self, v: i16) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_i32(&mut self, v: i32) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_i64(&mut self, v: i64) -> Result<(), Error> {
        self.set(v)
    }
}

impl Visitor for Slot<f64> {
    fn visit_f32(&mut self, v: f32) -> Result<(), Error> {
        self.set(v.into())
    }

    fn visit_f64(&mut self, v: f64) -> Result<(), Error> {
        self.set(v)
    }
}

impl Visitor for Slot<bool> {
    fn visit_bool(&mut self, v: bool) -> Result<(), Error> {
        self.set(v)
    }
}

impl Visitor for Slot<()> {
    fn visit_null(&mut self) -> Result<(), Error> {
        self.set(())
    }
}

impl Visitor for Slot<String> {
    fn visit_string(&mut self, v: &str) -> Result<(), Error> {
        self.set(v.into())
    }
}

impl Visitor for Slot<Vec<u8>> {
    fn visit_bytes(&mut self, v: &[u8]) -> Result<(), Error> {
        self.set(v.to_vec())
    }
}

struct ArrayOf<T>(Vec<T>);

impl<T> Visitor for ArrayOf<T>
where
    T: FromCbor,
{
    fn visit_array(&mut self, len: usize) -> Result<(), Error> {
        self.0.reserve(len.min(PRESIZE_LIMIT));
        Ok(())
    }

    fn visit_array_element(
        &mut self,
        decoder: &mut Decoder<'_>,
        _index: usize,
    ) -> Result<(), Error> {
        self.0.push(T::from_decoder(decoder)?);
        Ok(())
    }
}

macro_rules! impl_uint_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
                    let v = Slot::<u64>::parse(decoder)?;
                    <$ty>::try_from(v).map_err(|_| Error::OutOfRange(stringify!($ty)))
                }
            }
        )*
    };
}

impl_uint_from_cbor!(u8, u16, u32, u64, usize);

macro_rules! impl_int_from_cbor {
    ($($ty:ty),*) => {
        $(
            impl FromCbor for $ty {
                fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
                    let v = Slot::<i64>::parse(decoder)?;
                    <$ty>::try_from(v).map_err(|_| Error::OutOfRange(stringify!($ty)))
                }
            }
        )*
    };
}

impl_int_from_cbor!(i8, i16, i32, i64, isize);

impl FromCbor for f64 {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Slot::<f64>::parse(decoder)
    }
}

impl FromCbor for f32 {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        let v = Slot::<f64>::parse(decoder)?;
        if v.is_nan() {
            Ok(f32::NAN)
        } else {
            lossless_float_coerce(v).ok_or(Error::OutOfRange("f32"))
        }
    }
}

impl FromCbor for bool {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Slot::<bool>::parse(decoder)
    }
}

impl FromCbor for String {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Slot::<String>::parse(decoder)
    }
}

impl FromCbor for Vec<u8> {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        Slot::<Vec<u8>>::parse(decoder)
    }
}

impl<T> FromCbor for Option<T>
where
    T: FromCbor,
{
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        match decoder.peek() {
            Some(0xF6 | 0xF7) => Slot::<()>::parse(decoder).map(|_| None),
            _ => T::from_decoder(decoder).map(Some),
        }
    }
}

impl FromCbor for Value {
    fn from_decoder(decoder: &mut Decoder<'_>) -> Result<Self, Error> {
        let mut visitor = ValueVisitor::new();
        decoder.parse(&mut visitor)?;
        visitor.into_value().ok_or(Error::UnexpectedEndOfInput)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decode::Unsupported;
    use alloc::vec;
    use hex_literal::hex;

    #[test]
    fn integers() {
        assert_eq!(parse_as::<u8>(&hex!("17")), Ok(23));
        assert_eq!(parse_as::<u8>(&hex!("18ff")), Ok(255));
        assert_eq!(parse_as::<u8>(&hex!("190100")), Err(Error::OutOfRange("u8")));
        assert_eq!(parse_as::<u64>(&hex!("1bffffffffffffffff")), Ok(u64::MAX));
        assert_eq!(parse_as::<u64>(&hex!("20")), Err(Error::UnexpectedShape("i8")));
        assert_eq!(parse_as::<i64>(&hex!("3863")), Ok(-100));
        assert_eq!(parse_as::<i8>(&hex!("387f")), Ok(-128));
        assert_eq!(parse_as::<i8>(&hex!("3880")), Err(Error::OutOfRange("i8")));
        assert_eq!(
            parse_as::<i64>(&hex!("1bffffffffffffffff")),
            Err(Error::OutOfRange("i64"))
        );
        assert_eq!(
            parse_as::<i64>(&hex!("3b8000000000000000")),
            Err(Error::UnsupportedFeature(Unsupported::NegativeOverflow(
                0x8000000000000000
            )))
        );
        assert_eq!(parse_as::<i64>(&hex!("3b7fffffffffffffff")), Ok(i64::MIN));
    }

    #[test]
    fn no_coercion() {
        assert_eq!(parse_as::<u32>(&hex!("f93c00")), Err(Error::UnexpectedShape("f32")));
        assert_eq!(parse_as::<f64>(&hex!("01")), Err(Error::UnexpectedShape("u8")));
        assert_eq!(parse_as::<bool>(&hex!("f6")), Err(Error::UnexpectedShape("null")));
        assert_eq!(
            parse_as::<String>(&hex!("4161")),
            Err(Error::UnexpectedShape("byte string"))
        );
    }

    #[test]
    fn floats() {
        assert_eq!(parse_as::<f64>(&hex!("f93e00")), Ok(1.5));
        assert_eq!(parse_as::<f32>(&hex!("fa47c35000")), Ok(100000.0));
        assert_eq!(parse_as::<f32>(&hex!("fb3ff8000000000000")), Ok(1.5));
        assert_eq!(
            parse_as::<f32>(&hex!("fb3ff199999999999a")),
            Err(Error::OutOfRange("f32"))
        );
        assert!(parse_as::<f32>(&hex!("fb7ff8000000000000")).unwrap().is_nan());
    }

    #[test]
    fn strings_and_options() {
        assert_eq!(parse_as::<String>(&hex!("6449455446")).as_deref(), Ok("IETF"));
        assert_eq!(parse_as::<Vec<u8>>(&hex!("4401020304")), Ok(vec![1, 2, 3, 4]));
        assert_eq!(parse_as::<Option<u8>>(&hex!("f6")), Ok(None));
        assert_eq!(parse_as::<Option<u8>>(&hex!("f7")), Ok(None));
        assert_eq!(parse_as::<Option<u8>>(&hex!("05")), Ok(Some(5)));
        assert_eq!(parse_as::<bool>(&hex!("f5")), Ok(true));
    }

    #[test]
    fn prefix_and_trailing() {
        assert_eq!(u16::from_cbor(&hex!("1903e8 00")), Ok((1000, 3)));
        assert_eq!(parse_as::<u16>(&hex!("1903e8 00")), Err(Error::AdditionalData(1)));
    }

    #[test]
    fn typed_arrays() {
        let data = hex!("83 01 1818 190100");
        let mut decoder = Decoder::new(&data);
        assert_eq!(decode_array::<u16>(&mut decoder), Ok(vec![1, 24, 256]));
        assert!(decoder.is_empty());

        let data = hex!("82 61 61 f6");
        let mut decoder = Decoder::new(&data);
        assert_eq!(
            decode_array::<Option<String>>(&mut decoder),
            Ok(vec![Some("a".into()), None])
        );

        let data = hex!("82 01 61 61");
        let mut decoder = Decoder::new(&data);
        assert_eq!(
            decode_array::<u8>(&mut decoder),
            Err(Error::UnexpectedShape("text string"))
        );
    }

    #[test]
    fn generic_value() {
        assert_eq!(
            parse_as::<Value>(&hex!("820120")),
            Ok(Value::from_array(vec![Value::from(1u8), Value::from(-1i8)]))
        );
    }
}
