//! Value codec
//!
//! Converts a single field value to and from the store's representation.
//!
//! - `Primitive`: canonical text of the scalar ([`Scalar`])
//! - `Pointer`: as `Primitive`; `None` encodes to no value, so the hash
//!   field is absent rather than holding a sentinel
//! - `Inconvertible`: delegated to the schema's [`Fallback`] codec
//!
//! Decoding an absent field never reaches this module: the field keeps the
//! record's default value. Decoding unparsable text is a
//! `ModelError::Conversion` naming the field and the raw text.

pub mod fallback;
pub mod scalar;

pub use fallback::{
    get_fallback, Fallback, FallbackCodec, FallbackError, JsonCodec, MessagePackCodec, ValueCodec,
};
pub use scalar::Scalar;

use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a `Primitive` field value
pub fn encode_primitive<T: Scalar>(value: &T) -> Vec<u8> {
    value.encode_text().into_bytes()
}

/// Decode a `Primitive` field value
pub fn decode_primitive<T: Scalar>(field: &str, raw: &[u8]) -> ModelResult<T> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(T::decode_text)
        .ok_or_else(|| conversion_error(field, raw))
}

/// Encode a `Pointer` field value; `None` means "leave the field absent"
pub fn encode_pointer<T: Scalar>(value: &Option<T>) -> Option<Vec<u8>> {
    value.as_ref().map(encode_primitive)
}

/// Decode a present `Pointer` field value
pub fn decode_pointer<T: Scalar>(field: &str, raw: &[u8]) -> ModelResult<Option<T>> {
    decode_primitive(field, raw).map(Some)
}

/// Encode an `Inconvertible` field value through the fallback codec
pub fn encode_inconvertible<T: Serialize + ?Sized>(
    codec: &Fallback,
    field: &str,
    value: &T,
) -> ModelResult<Vec<u8>> {
    codec.marshal(value).map_err(|e| ModelError::Encoding {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Decode an `Inconvertible` field value through the fallback codec
pub fn decode_inconvertible<T: DeserializeOwned>(
    codec: &Fallback,
    field: &str,
    raw: &[u8],
) -> ModelResult<T> {
    codec
        .unmarshal(raw)
        .map_err(|_| conversion_error(field, raw))
}

fn conversion_error(field: &str, raw: &[u8]) -> ModelError {
    ModelError::Conversion {
        field: field.to_string(),
        raw: String::from_utf8_lossy(raw).into_owned(),
    }
}
