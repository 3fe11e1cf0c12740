use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::value::StringDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Number, Value};

use super::{Error, Result, OBJECT_ID_TOKEN};

/// Decodes extended JSON text into a value.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let tree: Value = serde_json::from_slice(bytes).map_err(|e| Error::Custom(e.to_string()))?;
    from_value(tree)
}

/// Decodes an extended JSON tree into a value.
pub fn from_value<T: DeserializeOwned>(tree: Value) -> Result<T> {
    T::deserialize(Deserializer(tree))
}

/// A scalar carried inside a single-key wrapper object.
enum Wrapped {
    Double(f64),
    Long(String),
    Binary(Vec<u8>),
    ObjectId(String),
}

fn unwrap_scalar(map: &Map<String, Value>) -> Result<Option<Wrapped>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((tag, inner)) = map.iter().next() else {
        return Ok(None);
    };

    let wrapped = match (tag.as_str(), inner) {
        ("$numberDouble", Value::String(text)) => {
            let v = parse_double(text)
                .ok_or_else(|| Error::InvalidWrapper(format!("$numberDouble {text:?}")))?;
            Wrapped::Double(v)
        }
        ("$numberLong", Value::String(text)) => Wrapped::Long(text.clone()),
        (OBJECT_ID_TOKEN, Value::String(hex)) => Wrapped::ObjectId(hex.clone()),
        ("$binary", Value::Object(binary)) => {
            let encoded = binary
                .get("base64")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::InvalidWrapper("$binary without base64".to_string()))?;
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| Error::InvalidWrapper(format!("$binary: {e}")))?;
            Wrapped::Binary(bytes)
        }
        _ => return Ok(None),
    };
    Ok(Some(wrapped))
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn visit_number<'de, V: Visitor<'de>>(number: &Number, visitor: V) -> Result<V::Value> {
    if let Some(v) = number.as_u64() {
        visitor.visit_u64(v)
    } else if let Some(v) = number.as_i64() {
        visitor.visit_i64(v)
    } else if let Some(v) = number.as_f64() {
        visitor.visit_f64(v)
    } else {
        Err(Error::Custom(format!("unrepresentable number {number}")))
    }
}

fn visit_long<'de, V: Visitor<'de>>(text: &str, visitor: V) -> Result<V::Value> {
    if let Ok(v) = text.parse::<i64>() {
        return visitor.visit_i64(v);
    }
    if let Ok(v) = text.parse::<u64>() {
        return visitor.visit_u64(v);
    }
    if let Ok(v) = text.parse::<i128>() {
        return visitor.visit_i128(v);
    }
    match text.parse::<u128>() {
        Ok(v) => visitor.visit_u128(v),
        Err(_) => Err(Error::InvalidWrapper(format!("$numberLong {text:?}"))),
    }
}

struct Deserializer(Value);

impl<'de> de::Deserializer<'de> for Deserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::Number(n) => visit_number(&n, visitor),
            Value::String(s) => visitor.visit_string(s),
            Value::Array(items) => visitor.visit_seq(SeqDecoder {
                items: items.into_iter(),
            }),
            Value::Object(map) => match unwrap_scalar(&map)? {
                Some(Wrapped::Double(v)) => visitor.visit_f64(v),
                Some(Wrapped::Long(text)) => visit_long(&text, visitor),
                Some(Wrapped::Binary(bytes)) => visitor.visit_byte_buf(bytes),
                Some(Wrapped::ObjectId(hex)) => visitor.visit_string(hex),
                None => visitor.visit_map(MapDecoder {
                    entries: map.into_iter(),
                    value: None,
                }),
            },
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(Deserializer(other)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.0 {
            Value::String(variant) => {
                let variant: StringDeserializer<Error> = variant.into_deserializer();
                visitor.visit_enum(variant)
            }
            Value::Object(map) if map.len() == 1 => {
                let Some((variant, value)) = map.into_iter().next() else {
                    return Err(Error::Custom("empty enum object".to_string()));
                };
                visitor.visit_enum(EnumDecoder { variant, value })
            }
            other => Err(Error::Custom(format!("expected enum, found {other}"))),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

struct SeqDecoder {
    items: std::vec::IntoIter<Value>,
}

impl<'de> SeqAccess<'de> for SeqDecoder {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.items.next() {
            Some(item) => seed.deserialize(Deserializer(item)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapDecoder {
    entries: serde_json::map::IntoIter,
    value: Option<Value>,
}

impl<'de> MapAccess<'de> for MapDecoder {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.entries.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(KeyDeserializer(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        match self.value.take() {
            Some(value) => seed.deserialize(Deserializer(value)),
            None => Err(Error::Custom("map value requested before its key".to_string())),
        }
    }
}

struct EnumDecoder {
    variant: String,
    value: Value,
}

impl<'de> EnumAccess<'de> for EnumDecoder {
    type Error = Error;
    type Variant = VariantDecoder;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, VariantDecoder)> {
        let variant = seed.deserialize(KeyDeserializer(self.variant))?;
        Ok((variant, VariantDecoder(self.value)))
    }
}

struct VariantDecoder(Value);

impl<'de> VariantAccess<'de> for VariantDecoder {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        de::Deserialize::deserialize(Deserializer(self.0))
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(Deserializer(self.0))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(Deserializer(self.0), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_map(Deserializer(self.0), visitor)
    }
}

/// Object keys are always text; numeric and bool map keys are parsed back
/// when the target type asks for them.
struct KeyDeserializer(String);

macro_rules! deserialize_parsed_key {
    ($($method:ident => $visit:ident,)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                match self.0.parse() {
                    Ok(v) => visitor.$visit(v),
                    Err(_) => visitor.visit_string(self.0),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(self.0)
    }

    deserialize_parsed_key! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_i128 => visit_i128,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_u128 => visit_u128,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let variant: StringDeserializer<Error> = self.0.into_deserializer();
        visitor.visit_enum(variant)
    }

    forward_to_deserialize_any! {
        char str string bytes byte_buf unit unit_struct seq tuple tuple_struct
        map struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::super::{to_string, to_value};
    use super::*;
    use crate::cache::ObjectId;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        id: u64,
        value: f64,
        low: Option<f64>,
        high: f64,
    }

    #[test]
    fn test_non_finite_doubles_survive() {
        let reading = Reading {
            id: 3,
            value: f64::NAN,
            low: Some(f64::NEG_INFINITY),
            high: f64::INFINITY,
        };

        let text = to_string(&reading).unwrap();
        let back: Reading = from_slice(text.as_bytes()).unwrap();

        assert_eq!(back.id, 3);
        assert!(back.value.is_nan());
        assert_eq!(back.low, Some(f64::NEG_INFINITY));
        assert_eq!(back.high, f64::INFINITY);
    }

    #[test]
    fn test_negative_zero_keeps_its_sign() {
        let back: f64 = from_value(to_value(&-0.0f64).unwrap()).unwrap();
        assert_eq!(back, 0.0);
        assert!(back.is_sign_negative());
    }

    #[test]
    fn test_wide_integers() {
        let big: u64 = u64::MAX;
        let small: i64 = i64::MIN;
        let huge: i128 = -(1i128 << 100);

        assert_eq!(from_value::<u64>(to_value(&big).unwrap()).unwrap(), big);
        assert_eq!(from_value::<i64>(to_value(&small).unwrap()).unwrap(), small);
        assert_eq!(from_value::<i128>(to_value(&huge).unwrap()).unwrap(), huge);
    }

    #[test]
    fn test_object_id_and_numeric_map_keys() {
        let oid: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        let mut owners = BTreeMap::new();
        owners.insert(7u32, oid);

        let back: BTreeMap<u32, ObjectId> = from_value(to_value(&owners).unwrap()).unwrap();
        assert_eq!(back, owners);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Shelf {
        Empty,
        Single(f64),
        Pair(u8, u8),
        Labeled { label: String, weight: f64 },
    }

    #[test]
    fn test_enum_variants() {
        for shelf in [
            Shelf::Empty,
            Shelf::Single(f64::INFINITY),
            Shelf::Pair(1, 2),
            Shelf::Labeled {
                label: "top".to_string(),
                weight: 2.5,
            },
        ] {
            let back: Shelf = from_value(to_value(&shelf).unwrap()).unwrap();
            assert_eq!(back, shelf);
        }
    }

    #[test]
    fn test_plain_json_still_decodes() {
        let back: Reading =
            from_slice(br#"{"id":1,"value":0.5,"low":null,"high":2}"#).unwrap();
        assert_eq!(
            back,
            Reading {
                id: 1,
                value: 0.5,
                low: None,
                high: 2.0,
            }
        );
    }

    #[test]
    fn test_malformed_wrappers() {
        assert!(matches!(
            from_slice::<f64>(br#"{"$numberDouble":"lots"}"#),
            Err(Error::InvalidWrapper(_))
        ));
        assert!(matches!(
            from_slice::<u64>(br#"{"$numberLong":"12x"}"#),
            Err(Error::InvalidWrapper(_))
        ));
        assert!(from_slice::<f64>(b"{not json").is_err());
    }
}
