/*!
The CBOR grammar.

A [`Decoder`] walks one data item at a time and pushes an event per item into
a [`Visitor`]. Containers are announced with their length, after which the
decoder hands control back to the visitor once per element (or map entry) so
that it can recurse through [`Decoder::parse`] with whatever visitor it
likes. Tags, indefinite-length items and simple values beyond
`false`/`true`/`null`/`undefined` are refused.
*/

use super::primitive::Reader;
use super::value::Value;
use super::visitor::{ValueVisitor, Visitor};
use thiserror::Error;
use tracing::{debug, trace};

/// Default limit on nested arrays and maps.
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Not enough data for encoded value")]
    UnexpectedEndOfInput,

    #[error("Reserved or unassigned initial byte {0:#04x}")]
    ReservedOrUnassignedCode(u8),

    #[error("Unsupported CBOR feature: {0}")]
    UnsupportedFeature(Unsupported),

    #[error("Length {0} is larger than the platform can address")]
    LengthOutOfRange(u64),

    #[error(transparent)]
    InvalidUtf8(#[from] core::str::Utf8Error),

    #[error("Maximum nesting depth of {0} exceeded")]
    DepthExceeded(usize),

    #[error("Unexpected {0}")]
    UnexpectedShape(&'static str),

    #[error("Break marker outside of an indefinite-length item")]
    UnexpectedBreak,

    #[error("{0} bytes of additional data after the end of the item")]
    AdditionalData(usize),

    #[error("Container element decoded {1} items, expected {0}")]
    ElementMismatch(usize, usize),

    #[error("Value is out of range for {0}")]
    OutOfRange(&'static str),
}

/// The CBOR features this decoder recognises but refuses to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    Tag(u64),
    /// Indefinite-length item of the given major type.
    IndefiniteLength(u8),
    SimpleValue(u8),
    /// A negative integer `-1 - n` below `i64::MIN`.
    NegativeOverflow(u64),
}

impl core::fmt::Display for Unsupported {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "tag {tag}"),
            Self::IndefiniteLength(major) => {
                write!(f, "indefinite-length item of major type {major}")
            }
            Self::SimpleValue(v) => write!(f, "simple value {v}"),
            Self::NegativeOverflow(n) => write!(f, "negative integer -1 - {n}"),
        }
    }
}

impl From<Unsupported> for Error {
    fn from(value: Unsupported) -> Self {
        Error::UnsupportedFeature(value)
    }
}

/// Decoder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// How many arrays/maps may be open at once. Zero allows only scalars.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A single-item CBOR parser over a borrowed buffer.
pub struct Decoder<'a> {
    reader: Reader<'a>,
    config: Config,
    depth: usize,
    // Items completed at the current depth; lets the decoder verify that a
    // visitor recursed exactly once per element.
    siblings: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, Config::default())
    }

    pub fn with_config(data: &'a [u8], config: Config) -> Self {
        Self {
            reader: Reader::new(data),
            config,
            depth: 0,
            siblings: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// The initial byte of the next item, if any.
    pub fn peek(&self) -> Option<u8> {
        self.reader.peek_u8()
    }

    /// Fails if any bytes remain after the last parsed item.
    pub fn finish(self) -> Result<usize, Error> {
        match self.reader.remaining() {
            0 => Ok(self.reader.position()),
            n => Err(Error::AdditionalData(n)),
        }
    }

    /// Parses exactly one data item, pushing its events into `visitor`.
    pub fn parse<V>(&mut self, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        let initial = self.reader.read_u8()?;
        match (initial >> 5, initial & 0x1F) {
            (0, minor) => self.parse_uint(minor, initial, visitor)?,
            (1, minor) => self.parse_nint(minor, initial, visitor)?,
            (major @ 2..=5, 31) => {
                trace!("Refusing indefinite-length item of major type {major}");
                return Err(Unsupported::IndefiniteLength(major).into());
            }
            (2, minor) => {
                let len = self.parse_length(minor, initial)?;
                visitor.visit_bytes(self.reader.read_slice(len)?)?
            }
            (3, minor) => {
                let len = self.parse_length(minor, initial)?;
                let s = core::str::from_utf8(self.reader.read_slice(len)?)?;
                visitor.visit_string(s)?
            }
            (4, minor) => {
                let len = self.parse_length(minor, initial)?;
                self.parse_array(len, visitor)?
            }
            (5, minor) => {
                let len = self.parse_length(minor, initial)?;
                self.parse_map(len, visitor)?
            }
            (6, minor) => {
                let tag = self.parse_argument(minor, initial)?;
                trace!("Refusing tag {tag}");
                return Err(Unsupported::Tag(tag).into());
            }
            (7, minor) => self.parse_simple(minor, initial, visitor)?,
            _ => unreachable!(),
        }
        self.siblings += 1;
        Ok(())
    }

    /// Reads the argument of a major type 0, 1, 2, 3, 4, 5 or 6 header.
    fn parse_argument(&mut self, minor: u8, initial: u8) -> Result<u64, Error> {
        match minor {
            0..24 => Ok(minor as u64),
            24 => self.reader.read_u8().map(u64::from),
            25 => self.reader.read_u16().map(u64::from),
            26 => self.reader.read_u32().map(u64::from),
            27 => self.reader.read_u64(),
            _ => Err(Error::ReservedOrUnassignedCode(initial)),
        }
    }

    fn parse_length(&mut self, minor: u8, initial: u8) -> Result<usize, Error> {
        let len = self.parse_argument(minor, initial)?;
        usize::try_from(len).map_err(|_| Error::LengthOutOfRange(len))
    }

    fn parse_uint<V>(&mut self, minor: u8, initial: u8, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        match minor {
            0..24 => visitor.visit_u8(minor),
            24 => visitor.visit_u8(self.reader.read_u8()?),
            25 => visitor.visit_u16(self.reader.read_u16()?),
            26 => visitor.visit_u32(self.reader.read_u32()?),
            27 => visitor.visit_u64(self.reader.read_u64()?),
            _ => Err(Error::ReservedOrUnassignedCode(initial)),
        }
    }

    fn parse_nint<V>(&mut self, minor: u8, initial: u8, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        // Each event is one step wider than the magnitude, so -1 - n always fits
        match minor {
            0..24 => visitor.visit_i8(-1 - minor as i8),
            24 => visitor.visit_i16(-1 - self.reader.read_u8()? as i16),
            25 => visitor.visit_i32(-1 - self.reader.read_u16()? as i32),
            26 => visitor.visit_i64(-1 - self.reader.read_u32()? as i64),
            27 => {
                let n = self.reader.read_u64()?;
                let n = i64::try_from(n).map_err(|_| Unsupported::NegativeOverflow(n))?;
                visitor.visit_i64(-1 - n)
            }
            _ => Err(Error::ReservedOrUnassignedCode(initial)),
        }
    }

    fn parse_simple<V>(&mut self, minor: u8, initial: u8, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        match minor {
            20 => visitor.visit_bool(false),
            21 => visitor.visit_bool(true),
            22 | 23 => visitor.visit_null(),
            25 => visitor.visit_f32(self.reader.read_f16()?.to_f32()),
            26 => visitor.visit_f32(self.reader.read_f32()?),
            27 => visitor.visit_f64(self.reader.read_f64()?),
            0..20 => {
                trace!("Refusing simple value {minor}");
                Err(Unsupported::SimpleValue(minor).into())
            }
            24 => match self.reader.read_u8()? {
                // Two-byte encodings of the one-byte simple values are not well-formed
                0..32 => Err(Error::ReservedOrUnassignedCode(initial)),
                v => {
                    trace!("Refusing simple value {v}");
                    Err(Unsupported::SimpleValue(v).into())
                }
            },
            31 => Err(Error::UnexpectedBreak),
            _ => Err(Error::ReservedOrUnassignedCode(initial)),
        }
    }

    fn enter(&mut self) -> Result<usize, Error> {
        if self.depth >= self.config.max_depth {
            debug!(
                "CBOR nesting exceeds maximum depth of {}",
                self.config.max_depth
            );
            return Err(Error::DepthExceeded(self.config.max_depth));
        }
        self.depth += 1;
        Ok(core::mem::replace(&mut self.siblings, 0))
    }

    fn leave(&mut self, siblings: usize) {
        self.depth -= 1;
        self.siblings = siblings;
    }

    fn parse_array<V>(&mut self, len: usize, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        // Every element takes at least one byte
        if len > self.reader.remaining() {
            return Err(Error::UnexpectedEndOfInput);
        }
        let saved = self.enter()?;
        let r = self.parse_array_elements(len, visitor);
        self.leave(saved);
        r
    }

    fn parse_array_elements<V>(&mut self, len: usize, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        visitor.visit_array(len)?;
        for index in 0..len {
            visitor.visit_array_element(self, index)?;
            if self.siblings != index + 1 {
                return Err(Error::ElementMismatch(index + 1, self.siblings));
            }
        }
        Ok(())
    }

    fn parse_map<V>(&mut self, len: usize, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        // Every entry takes at least two bytes
        if len > self.reader.remaining() / 2 {
            return Err(Error::UnexpectedEndOfInput);
        }
        let saved = self.enter()?;
        let r = self.parse_map_entries(len, visitor);
        self.leave(saved);
        r
    }

    fn parse_map_entries<V>(&mut self, len: usize, visitor: &mut V) -> Result<(), Error>
    where
        V: Visitor + ?Sized,
    {
        visitor.visit_map(len)?;
        for index in 0..len {
            visitor.visit_map_entry(self)?;
            let expected = (index + 1) * 2;
            if self.siblings != expected {
                return Err(Error::ElementMismatch(expected, self.siblings));
            }
        }
        Ok(())
    }
}

/// Parses one item from the front of `data` into `visitor`.
///
/// Returns the number of bytes consumed; trailing bytes are left alone.
pub fn parse<V>(data: &[u8], visitor: &mut V) -> Result<usize, Error>
where
    V: Visitor + ?Sized,
{
    let mut decoder = Decoder::new(data);
    decoder.parse(visitor)?;
    Ok(decoder.position())
}

/// Decodes one item from the front of `data`, returning it and its length.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), Error> {
    decode_prefix_with_config(data, Config::default())
}

pub fn decode_prefix_with_config(data: &[u8], config: Config) -> Result<(Value, usize), Error> {
    let mut decoder = Decoder::with_config(data, config);
    let mut visitor = ValueVisitor::new();
    decoder.parse(&mut visitor)?;
    let value = visitor.into_value().ok_or(Error::UnexpectedEndOfInput)?;
    Ok((value, decoder.position()))
}

/// Decodes `data`, which must hold exactly one item.
pub fn decode(data: &[u8]) -> Result<Value, Error> {
    decode_with_config(data, Config::default())
}

pub fn decode_with_config(data: &[u8], config: Config) -> Result<Value, Error> {
    let (value, len) = decode_prefix_with_config(data, config)?;
    match data.len() - len {
        0 => Ok(value),
        n => Err(Error::AdditionalData(n)),
    }
}
