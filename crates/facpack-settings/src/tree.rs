use serde_json::{Map, Number, Value};

use crate::codec::CodecError;

/// A node of the game's generic tagged value format.
///
/// Dictionaries keep their insertion order, which is also the order they are
/// written to disk in.
#[derive(Clone, PartialEq, Default, Debug)]
pub enum PropertyTree {
    #[default]
    None,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PropertyTree>),
    Dictionary(Vec<(String, PropertyTree)>),
}

/// The type tag written in front of every [`PropertyTree`] node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, strum::Display)]
#[repr(u8)]
pub enum Tag {
    None = 0,
    Bool = 1,
    Number = 2,
    String = 3,
    List = 4,
    Dictionary = 5,
}

impl TryFrom<u8> for Tag {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Self::None,
            1 => Self::Bool,
            2 => Self::Number,
            3 => Self::String,
            4 => Self::List,
            5 => Self::Dictionary,
            unknown => return Err(unknown),
        })
    }
}

impl PropertyTree {
    #[must_use]
    pub const fn tag(&self) -> Tag {
        match self {
            Self::None => Tag::None,
            Self::Bool(_) => Tag::Bool,
            Self::Number(_) => Tag::Number,
            Self::String(_) => Tag::String,
            Self::List(_) => Tag::List,
            Self::Dictionary(_) => Tag::Dictionary,
        }
    }

    /// Looks `key` up in a dictionary node. Returns [`None`] for every other
    /// kind of node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dictionary(entries) => entries
                .iter()
                .find(|(entry_key, _)| entry_key == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Converts this tree into a JSON value.
    ///
    /// Lists become JSON **objects** keyed by their indices (`"0"`, `"1"`,
    /// ...), since on disk a list is just a dictionary with blank keys. This
    /// means a list does not survive a JSON round trip as a list. Integral
    /// numbers are rendered as JSON integers.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Number(number) => number_to_json(*number),
            Self::String(string) => Value::String(string.clone()),
            Self::List(items) => Value::Object(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Dictionary(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Builds a tree from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedType`] for numbers that can't be
    /// represented as an `f64`.
    pub fn from_json(value: &Value) -> Result<Self, CodecError> {
        Ok(match value {
            Value::Null => Self::None,
            Value::Bool(value) => Self::Bool(*value),
            Value::Number(number) => {
                Self::Number(number.as_f64().ok_or(CodecError::UnsupportedType {
                    kind: "arbitrary precision number",
                })?)
            }
            Value::String(string) => Self::String(string.clone()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(entries) => Self::Dictionary(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), Self::from_json(value)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
        })
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number_to_json(number: f64) -> Value {
    const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;
    if number.fract() == 0.0 && number.abs() < EXACT_INTEGER_LIMIT {
        let integer = number as i64;
        if integer as f64 == number {
            return Value::Number(Number::from(integer));
        }
    }

    Number::from_f64(number).map_or(Value::Null, Value::Number)
}
