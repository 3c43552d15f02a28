//! Converters between Rust body types and HTTP payloads.
//!
//! A factory is selected per body type: the first registered [`ConverterFactory`]
//! whose [`supports`](ConverterFactory::supports) accepts the type wins. Converters
//! work on [`serde_json::Value`] as the intermediate form so that any `serde` type can
//! be produced from, or turned into, a payload.
//!
//! Two factories ship with the crate:
//!
//! - [`ScalarsConverterFactory`] handles `String`, `char`, `bool` and the numeric
//!   primitives as `text/plain`. It is registered by default.
//! - [`JsonConverterFactory`] handles every type as `application/json`. Register it from
//!   a [`configure`](crate::ClientBuilder::configure) callback.

use crate::{Error, RequestBody, Result};
use serde_json::Value;
use std::any::TypeId;
use std::fmt;

const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
const APPLICATION_JSON: &str = "application/json";

/// Identity of a request or response body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyType {
    id: TypeId,
    name: &'static str,
}

impl BodyType {
    /// Returns the `BodyType` of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the body type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust name of the body type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is the body type of `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Converts response payloads into values and values into request payloads.
///
/// # Examples
///
/// A converter that only handles `String` bodies, upper-casing responses:
///
/// ```
/// use retrofit_reqwest::{BodyType, ConverterFactory, RequestBody, Result};
/// use serde_json::Value;
///
/// #[derive(Debug)]
/// struct Shouting;
///
/// impl ConverterFactory for Shouting {
///     fn name(&self) -> &'static str {
///         "shouting"
///     }
///
///     fn supports(&self, ty: &BodyType) -> bool {
///         ty.is::<String>()
///     }
///
///     fn decode(&self, _ty: &BodyType, raw: &str) -> std::result::Result<Value, String> {
///         Ok(Value::String(raw.to_uppercase()))
///     }
///
///     fn encode(&self, _ty: &BodyType, value: Value) -> Result<RequestBody> {
///         Ok(RequestBody::new("text/plain", value.to_string()))
///     }
/// }
/// ```
pub trait ConverterFactory: Send + Sync + fmt::Debug {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if this factory converts bodies of type `ty`.
    fn supports(&self, ty: &BodyType) -> bool;

    /// Decodes a response payload into the intermediate value for `ty`.
    ///
    /// The error string is surfaced as the `serde_error` of
    /// [`Error::DeserializationFailed`].
    fn decode(&self, ty: &BodyType, raw: &str) -> std::result::Result<Value, String>;

    /// Encodes a request value of type `ty` into a payload.
    fn encode(&self, ty: &BodyType, value: Value) -> Result<RequestBody>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Text,
    Char,
    Bool,
    Signed,
    Unsigned,
    Float,
}

fn scalar_kind(ty: &BodyType) -> Option<ScalarKind> {
    let id = ty.id();
    let signed = [
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<isize>(),
    ];
    let unsigned = [
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<usize>(),
    ];

    if id == TypeId::of::<String>() {
        Some(ScalarKind::Text)
    } else if id == TypeId::of::<char>() {
        Some(ScalarKind::Char)
    } else if id == TypeId::of::<bool>() {
        Some(ScalarKind::Bool)
    } else if signed.contains(&id) {
        Some(ScalarKind::Signed)
    } else if unsigned.contains(&id) {
        Some(ScalarKind::Unsigned)
    } else if id == TypeId::of::<f32>() || id == TypeId::of::<f64>() {
        Some(ScalarKind::Float)
    } else {
        None
    }
}

/// Converts strings, characters, booleans and numbers to and from `text/plain`.
///
/// Numeric bodies are parsed after trimming surrounding whitespace; range checks
/// happen when the value is turned into the concrete integer type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarsConverterFactory;

impl ScalarsConverterFactory {
    /// Creates the factory.
    pub fn create() -> Self {
        Self
    }
}

impl ConverterFactory for ScalarsConverterFactory {
    fn name(&self) -> &'static str {
        "scalars"
    }

    fn supports(&self, ty: &BodyType) -> bool {
        scalar_kind(ty).is_some()
    }

    fn decode(&self, ty: &BodyType, raw: &str) -> std::result::Result<Value, String> {
        let kind = scalar_kind(ty).ok_or_else(|| format!("{} is not a scalar type", ty))?;
        match kind {
            ScalarKind::Text => Ok(Value::String(raw.to_owned())),
            ScalarKind::Char => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::String(c.to_string())),
                    _ => Err(format!("expected a single character, got {:?}", raw)),
                }
            }
            ScalarKind::Bool => raw
                .trim()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| e.to_string()),
            ScalarKind::Signed => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            ScalarKind::Unsigned => raw
                .trim()
                .parse::<u64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            ScalarKind::Float => {
                let n = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{} is not a finite number", n))
            }
        }
    }

    fn encode(&self, ty: &BodyType, value: Value) -> Result<RequestBody> {
        let text = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(Error::SerializationFailed(format!(
                    "{} did not serialize to a scalar: {}",
                    ty, other
                )))
            }
        };
        Ok(RequestBody::new(TEXT_PLAIN, text))
    }
}

/// Converts any `serde` type to and from `application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverterFactory;

impl JsonConverterFactory {
    /// Creates the factory.
    pub fn create() -> Self {
        Self
    }
}

impl ConverterFactory for JsonConverterFactory {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supports(&self, _ty: &BodyType) -> bool {
        true
    }

    fn decode(&self, _ty: &BodyType, raw: &str) -> std::result::Result<Value, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }

    fn encode(&self, _ty: &BodyType, value: Value) -> Result<RequestBody> {
        let bytes =
            serde_json::to_vec(&value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        Ok(RequestBody::new(APPLICATION_JSON, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_support_only_primitives() {
        let scalars = ScalarsConverterFactory::create();
        assert!(scalars.supports(&BodyType::of::<String>()));
        assert!(scalars.supports(&BodyType::of::<u16>()));
        assert!(scalars.supports(&BodyType::of::<f32>()));
        assert!(!scalars.supports(&BodyType::of::<Vec<u8>>()));
        assert!(!scalars.supports(&BodyType::of::<serde_json::Value>()));
    }

    #[test]
    fn test_scalars_decode() {
        let scalars = ScalarsConverterFactory::create();
        let ty = BodyType::of::<i32>();
        assert_eq!(scalars.decode(&ty, " -12\n").unwrap(), Value::from(-12));
        assert!(scalars.decode(&ty, "twelve").is_err());

        let ty = BodyType::of::<String>();
        assert_eq!(
            scalars.decode(&ty, " hello ").unwrap(),
            Value::String(" hello ".to_string())
        );

        let ty = BodyType::of::<char>();
        assert!(scalars.decode(&ty, "ab").is_err());
        assert_eq!(
            scalars.decode(&ty, "a").unwrap(),
            Value::String("a".to_string())
        );
    }

    #[test]
    fn test_scalars_out_of_range_fails_on_conversion() {
        let scalars = ScalarsConverterFactory::create();
        let value = scalars.decode(&BodyType::of::<u8>(), "300").unwrap();
        assert!(serde_json::from_value::<u8>(value).is_err());
    }

    #[test]
    fn test_scalars_encode() {
        let scalars = ScalarsConverterFactory::create();
        let body = scalars
            .encode(&BodyType::of::<u32>(), Value::from(7))
            .unwrap();
        assert_eq!(body.content_type, TEXT_PLAIN);
        assert_eq!(&body.bytes[..], b"7");

        let body = scalars
            .encode(&BodyType::of::<String>(), Value::String("hi".into()))
            .unwrap();
        assert_eq!(&body.bytes[..], b"hi");
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = JsonConverterFactory::create();
        let ty = BodyType::of::<Value>();
        let value = json.decode(&ty, r#"{"id":1}"#).unwrap();
        assert_eq!(value["id"], 1);

        let body = json.encode(&ty, value).unwrap();
        assert_eq!(body.content_type, APPLICATION_JSON);
        assert_eq!(&body.bytes[..], br#"{"id":1}"#);
        assert!(json.decode(&ty, "not json").is_err());
    }
}
