//! AMF0 value types.

use rtmpub_bytes_util::StringCow;

/// An AMF0 `Object` or `EcmaArray` property list: an ordered sequence of
/// name/value pairs.
pub type Amf0Properties = Vec<(StringCow<'static>, Amf0Value)>;

/// Any AMF0 value.
///
/// `Object` and `EcmaArray` share a representation (an ordered property
/// list) but are distinct wire markers — an `EcmaArray` additionally carries
/// a 4-byte element-count prefix that this type does not surface because
/// nothing downstream uses it.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    /// AMF0 Number: an IEEE-754 double, big-endian on the wire.
    Number(f64),
    /// AMF0 Boolean.
    Boolean(bool),
    /// AMF0 String (short or long form, chosen automatically on encode by length).
    String(StringCow<'static>),
    /// AMF0 Object: an ordered property list terminated by the `00 00 09` sentinel.
    Object(Amf0Properties),
    /// AMF0 ECMA-Array: an ordered property list with an (unused) element-count prefix.
    EcmaArray(Amf0Properties),
    /// AMF0 Null.
    Null,
}

impl Amf0Value {
    /// Builds a tagged [`Amf0Value::String`] from anything that converts into a [`StringCow`].
    pub fn string(s: impl Into<StringCow<'static>>) -> Self {
        Amf0Value::String(s.into())
    }

    /// Looks up a property by name in an [`Amf0Value::Object`] or [`Amf0Value::EcmaArray`].
    ///
    /// Returns `None` for any other variant, or if the name is absent.
    pub fn get_property(&self, name: &str) -> Option<&Amf0Value> {
        match self {
            Amf0Value::Object(props) | Amf0Value::EcmaArray(props) => {
                props.iter().find(|(k, _)| k.as_str() == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Returns the contained [`f64`], if this is a [`Amf0Value::Number`].
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the contained string slice, if this is a [`Amf0Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}

impl From<&'static str> for Amf0Value {
    fn from(value: &'static str) -> Self {
        Amf0Value::String(StringCow::from_static(value))
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::String(StringCow::from(value))
    }
}
