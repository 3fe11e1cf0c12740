//! Extended JSON encoding for cache keys and cached entities.
//!
//! Plain JSON loses information for several values a lookup can carry: a
//! non-finite double has no JSON literal (`serde_json` writes `null`), an
//! integer wider than 53 bits does not survive a round trip through a
//! double, and byte strings become arrays of numbers. This encoder keeps
//! those values distinct by wrapping them in single-key objects:
//!
//! | value                                  | encoding                                         |
//! |----------------------------------------|--------------------------------------------------|
//! | `NaN`, `±inf`, `-0.0`                  | `{"$numberDouble": "NaN" \| "Infinity" \| ...}`  |
//! | integer outside `±(2^53 - 1)`          | `{"$numberLong": "<decimal>"}`                   |
//! | byte string                            | `{"$binary": {"base64": "...", "subType": "00"}}`|
//! | [`ObjectId`](super::ObjectId)          | `{"$oid": "<hex>"}`                              |
//!
//! Object keys are always emitted in sorted order, so two values that are
//! equal produce byte-identical output regardless of field declaration or
//! map insertion order.
//!
//! [`from_slice`] and [`from_value`] reverse the encoding, so a value that
//! went through [`to_string`] reads back unchanged, non-finite doubles
//! included.

use std::collections::BTreeMap;
use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de;
use serde::ser::{self, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use super::object_id::OBJECT_ID_TOKEN;

mod decode;

pub use decode::{from_slice, from_value};

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Errors that can occur while encoding or decoding a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Map key must be a string, number or bool, got {0}")]
    InvalidMapKey(String),
    #[error("Malformed extended JSON wrapper: {0}")]
    InvalidWrapper(String),
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

/// Result type for extended JSON encoding.
pub type Result<T> = std::result::Result<T, Error>;

/// Encodes a value into an extended JSON tree.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(Serializer)
}

/// Encodes a value into its canonical extended JSON text.
pub fn to_string<T: ?Sized + Serialize>(value: &T) -> Result<String> {
    let tree = to_value(value)?;
    serde_json::to_string(&tree).map_err(|e| Error::Custom(e.to_string()))
}

fn wrap(tag: &str, inner: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(tag.to_string(), inner);
    Value::Object(map)
}

fn sorted_object(entries: BTreeMap<String, Value>) -> Value {
    Value::Object(entries.into_iter().collect())
}

fn encode_signed(v: i128) -> Value {
    if v.unsigned_abs() <= u128::from(MAX_SAFE_INTEGER) {
        // Within ±(2^53 - 1), so the cast is lossless.
        Value::Number(Number::from(v as i64))
    } else {
        wrap("$numberLong", Value::String(v.to_string()))
    }
}

fn encode_unsigned(v: u128) -> Value {
    if v <= u128::from(MAX_SAFE_INTEGER) {
        Value::Number(Number::from(v as u64))
    } else {
        wrap("$numberLong", Value::String(v.to_string()))
    }
}

fn encode_double(v: f64) -> Value {
    let special = if v.is_nan() {
        "NaN"
    } else if v == f64::INFINITY {
        "Infinity"
    } else if v == f64::NEG_INFINITY {
        "-Infinity"
    } else if v == 0.0 && v.is_sign_negative() {
        "-0.0"
    } else {
        return Number::from_f64(v).map_or(Value::Null, Value::Number);
    };
    wrap("$numberDouble", Value::String(special.to_string()))
}

/// Turns an encoded map key into object-key text.
fn map_key(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::InvalidMapKey(other.to_string())),
    }
}

/// Serializer producing extended JSON [`Value`]s.
pub struct Serializer;

impl ser::Serializer for Serializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(encode_signed(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(encode_signed(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(encode_signed(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(encode_signed(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(encode_signed(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(encode_unsigned(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(encode_unsigned(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(encode_unsigned(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(encode_unsigned(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(encode_unsigned(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(encode_double(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(encode_double(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        let mut binary = BTreeMap::new();
        binary.insert("base64".to_string(), Value::String(STANDARD.encode(v)));
        binary.insert("subType".to_string(), Value::String("00".to_string()));
        Ok(wrap("$binary", sorted_object(binary)))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        let inner = value.serialize(self)?;
        if name == OBJECT_ID_TOKEN {
            Ok(wrap(OBJECT_ID_TOKEN, inner))
        } else {
            Ok(inner)
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        Ok(wrap(variant, to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap {
            entries: BTreeMap::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMap> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SerializeStructVariant> {
        Ok(SerializeStructVariant {
            variant,
            entries: BTreeMap::new(),
        })
    }
}

pub struct SerializeVec {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(wrap(self.variant, Value::Array(self.items)))
    }
}

pub struct SerializeMap {
    entries: BTreeMap<String, Value>,
    next_key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(map_key(to_value(key)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| Error::Custom("map value serialized before its key".to_string()))?;
        self.entries.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(sorted_object(self.entries))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.entries.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(sorted_object(self.entries))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    entries: BTreeMap<String, Value>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.entries.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(wrap(self.variant, sorted_object(self.entries)))
    }
}
