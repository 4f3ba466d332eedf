#![no_std]
extern crate alloc;

pub mod decode;
pub mod encode;
pub mod primitive;
pub mod typed;
pub mod value;
pub mod visitor;

pub use decode::{Config, Decoder, Error, decode, decode_prefix, parse};
pub use encode::{Encoder, ToCbor, emit, encode};
pub use typed::FromCbor;
pub use value::{Map, Value};
pub use visitor::{ValueVisitor, Visitor};
