use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Possible kinds of a [`SettingValue`].
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum SettingKind {
    Boolean,
    Integer,
    FloatingPoint,
    String,
}

impl SettingKind {
    /// Whether a value of this kind can be read as a value of kind `other`.
    ///
    /// Every kind is compatible to itself, and integers are compatible to
    /// floating point numbers. The reverse does not hold.
    #[must_use]
    pub const fn is_compatible_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Boolean, Self::Boolean)
                | (Self::Integer, Self::Integer | Self::FloatingPoint)
                | (Self::FloatingPoint, Self::FloatingPoint)
                | (Self::String, Self::String)
        )
    }
}

/// The value of a single mod setting.
///
/// The kind is fixed when the value is constructed, see [`Self::set`].
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    FloatingPoint(f64),
    String(String),
}

/// A [`SettingValue`] was read or written as the wrong [`SettingKind`].
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("Expected a {expected} setting value, got a {actual} one")]
pub struct WrongType {
    pub expected: SettingKind,
    pub actual: SettingKind,
}

impl SettingValue {
    #[must_use]
    pub const fn kind(&self) -> SettingKind {
        match self {
            Self::Boolean(_) => SettingKind::Boolean,
            Self::Integer(_) => SettingKind::Integer,
            Self::FloatingPoint(_) => SettingKind::FloatingPoint,
            Self::String(_) => SettingKind::String,
        }
    }

    const fn wrong_type(&self, expected: SettingKind) -> WrongType {
        WrongType {
            expected,
            actual: self.kind(),
        }
    }

    pub const fn as_bool(&self) -> Result<bool, WrongType> {
        match self {
            Self::Boolean(value) => Ok(*value),
            _ => Err(self.wrong_type(SettingKind::Boolean)),
        }
    }

    pub const fn as_integer(&self) -> Result<i64, WrongType> {
        match self {
            Self::Integer(value) => Ok(*value),
            _ => Err(self.wrong_type(SettingKind::Integer)),
        }
    }

    /// Reads this value as a floating point number, widening integers.
    #[expect(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Result<f64, WrongType> {
        match self {
            Self::FloatingPoint(value) => Ok(*value),
            Self::Integer(value) => Ok(*value as f64),
            _ => Err(self.wrong_type(SettingKind::FloatingPoint)),
        }
    }

    pub fn as_str(&self) -> Result<&str, WrongType> {
        match self {
            Self::String(value) => Ok(value),
            _ => Err(self.wrong_type(SettingKind::String)),
        }
    }

    /// Generic form of the `as_*` accessors.
    pub fn get<T: FromSettingValue>(&self) -> Result<T, WrongType> {
        T::from_setting_value(self)
    }

    /// Replaces the stored value, keeping the kind of `self`.
    ///
    /// # Errors
    ///
    /// Returns [`WrongType`] if `value` is not compatible to the kind of
    /// `self`. An integer assigned to a floating point value gets widened.
    #[expect(clippy::cast_precision_loss)]
    pub fn set(&mut self, value: impl Into<Self>) -> Result<(), WrongType> {
        let value = value.into();
        if self.kind() == value.kind() {
            *self = value;
            return Ok(());
        }

        match (self, value) {
            (Self::FloatingPoint(slot), Self::Integer(integer)) => {
                *slot = integer as f64;
                Ok(())
            }
            (slot, value) => Err(WrongType {
                expected: slot.kind(),
                actual: value.kind(),
            }),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::FloatingPoint(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::FloatingPoint(value)
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Types that can be read out of a [`SettingValue`].
pub trait FromSettingValue: Sized {
    /// # Errors
    ///
    /// Returns [`WrongType`] if `value` holds an incompatible kind.
    fn from_setting_value(value: &SettingValue) -> Result<Self, WrongType>;
}

impl FromSettingValue for bool {
    fn from_setting_value(value: &SettingValue) -> Result<Self, WrongType> {
        value.as_bool()
    }
}

impl FromSettingValue for i64 {
    fn from_setting_value(value: &SettingValue) -> Result<Self, WrongType> {
        value.as_integer()
    }
}

impl FromSettingValue for f64 {
    fn from_setting_value(value: &SettingValue) -> Result<Self, WrongType> {
        value.as_float()
    }
}

impl FromSettingValue for String {
    fn from_setting_value(value: &SettingValue) -> Result<Self, WrongType> {
        value.as_str().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{SettingKind, SettingValue, WrongType};

    #[test]
    fn integers_widen_to_floats() {
        let value = SettingValue::Integer(5);
        assert_eq!(value.as_float(), Ok(5.0));
        assert_eq!(value.get::<f64>(), Ok(5.0));
        assert_eq!(value.get::<i64>(), Ok(5));
        assert_eq!(
            value.as_bool(),
            Err(WrongType {
                expected: SettingKind::Boolean,
                actual: SettingKind::Integer,
            })
        );
        assert!(value.as_str().is_err());
        assert!(value.get::<String>().is_err());
    }

    #[test]
    fn floats_do_not_narrow() {
        let value = SettingValue::FloatingPoint(2.5);
        assert_eq!(
            value.as_integer(),
            Err(WrongType {
                expected: SettingKind::Integer,
                actual: SettingKind::FloatingPoint,
            })
        );
    }

    #[rstest]
    #[case(SettingKind::Integer, SettingKind::FloatingPoint, true)]
    #[case(SettingKind::FloatingPoint, SettingKind::Integer, false)]
    #[case(SettingKind::String, SettingKind::String, true)]
    #[case(SettingKind::Boolean, SettingKind::Integer, false)]
    fn compatibility(#[case] kind: SettingKind, #[case] other: SettingKind, #[case] expected: bool) {
        assert_eq!(kind.is_compatible_to(other), expected);
    }

    #[test]
    fn set_keeps_the_kind() {
        let mut value = SettingValue::FloatingPoint(1.0);
        value.set(3_i64).unwrap();
        assert_eq!(value, SettingValue::FloatingPoint(3.0));

        let mut value = SettingValue::Integer(1);
        assert_eq!(
            value.set(0.5),
            Err(WrongType {
                expected: SettingKind::Integer,
                actual: SettingKind::FloatingPoint,
            })
        );
        assert_eq!(value, SettingValue::Integer(1));

        let mut value = SettingValue::from("iron");
        value.set("copper").unwrap();
        assert_eq!(value.as_str(), Ok("copper"));
        assert!(value.set(true).is_err());
    }

    #[test]
    fn serde_is_untagged() {
        let values: Vec<SettingValue> = serde_json::from_str(r#"[true, 5, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                SettingValue::Boolean(true),
                SettingValue::Integer(5),
                SettingValue::FloatingPoint(2.5),
                SettingValue::String("x".into()),
            ]
        );
    }
}
