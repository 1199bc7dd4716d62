//! Fallback codecs for fields with no native representation
//!
//! The fallback codec is a per-schema strategy. Two are provided:
//!
//! - `"msgpack"`: [`MessagePackCodec`], self-describing binary (field names kept)
//! - `"json"`: [`JsonCodec`], self-describing text
//!
//! [`Fallback`] selects one of them and is what a schema stores. Callers can
//! plug in their own strategy by implementing [`ValueCodec`] and wrapping it
//! with [`Fallback::custom`].

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Fallback codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackError {
    /// Value could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Stored bytes could not be deserialized
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unknown codec identifier
    #[error("Unknown fallback codec: {0}")]
    UnknownCodec(String),
}

/// Serialization strategy for `Inconvertible` fields
pub trait FallbackCodec: Send + Sync {
    /// Unique codec identifier (used in configuration)
    fn codec_id(&self) -> &str;

    /// Serialize a value into an opaque blob
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, FallbackError>;

    /// Deserialize a blob produced by `marshal`
    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FallbackError>;
}

/// MessagePack with named struct fields
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl FallbackCodec for MessagePackCodec {
    fn codec_id(&self) -> &str {
        "msgpack"
    }

    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, FallbackError> {
        rmp_serde::to_vec_named(value).map_err(|e| FallbackError::Encode(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FallbackError> {
        rmp_serde::from_slice(data).map_err(|e| FallbackError::Decode(e.to_string()))
    }
}

/// JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FallbackCodec for JsonCodec {
    fn codec_id(&self) -> &str {
        "json"
    }

    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, FallbackError> {
        serde_json::to_vec(value).map_err(|e| FallbackError::Encode(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FallbackError> {
        serde_json::from_slice(data).map_err(|e| FallbackError::Decode(e.to_string()))
    }
}

/// Object-safe codec supplied by the caller
///
/// Values cross this boundary as a [`serde_json::Value`], so a custom codec
/// works on the JSON data model: map keys arrive as strings.
pub trait ValueCodec: Send + Sync {
    /// Unique codec identifier
    fn codec_id(&self) -> &str;

    /// Serialize a value tree into an opaque blob
    fn encode_value(&self, value: &serde_json::Value) -> Result<Vec<u8>, FallbackError>;

    /// Deserialize a blob produced by `encode_value`
    fn decode_value(&self, data: &[u8]) -> Result<serde_json::Value, FallbackError>;
}

/// The fallback codec selected for a schema
///
/// Two schemas agree on their fallback when the codec ids match.
#[derive(Clone, Default)]
pub enum Fallback {
    /// [`MessagePackCodec`]
    #[default]
    MessagePack,
    /// [`JsonCodec`]
    Json,
    /// A caller-supplied [`ValueCodec`]
    Custom(Arc<dyn ValueCodec>),
}

impl Fallback {
    /// Wrap a caller-supplied codec
    pub fn custom(codec: impl ValueCodec + 'static) -> Self {
        Fallback::Custom(Arc::new(codec))
    }
}

impl FallbackCodec for Fallback {
    fn codec_id(&self) -> &str {
        match self {
            Fallback::MessagePack => MessagePackCodec.codec_id(),
            Fallback::Json => JsonCodec.codec_id(),
            Fallback::Custom(codec) => codec.codec_id(),
        }
    }

    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, FallbackError> {
        match self {
            Fallback::MessagePack => MessagePackCodec.marshal(value),
            Fallback::Json => JsonCodec.marshal(value),
            Fallback::Custom(codec) => {
                let tree =
                    serde_json::to_value(value).map_err(|e| FallbackError::Encode(e.to_string()))?;
                codec.encode_value(&tree)
            }
        }
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, FallbackError> {
        match self {
            Fallback::MessagePack => MessagePackCodec.unmarshal(data),
            Fallback::Json => JsonCodec.unmarshal(data),
            Fallback::Custom(codec) => {
                let tree = codec.decode_value(data)?;
                serde_json::from_value(tree).map_err(|e| FallbackError::Decode(e.to_string()))
            }
        }
    }
}

impl PartialEq for Fallback {
    fn eq(&self, other: &Self) -> bool {
        self.codec_id() == other.codec_id()
    }
}

impl Eq for Fallback {}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fallback::MessagePack => f.write_str("MessagePack"),
            Fallback::Json => f.write_str("Json"),
            Fallback::Custom(codec) => f.debug_tuple("Custom").field(&codec.codec_id()).finish(),
        }
    }
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_id())
    }
}

impl Serialize for Fallback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.codec_id())
    }
}

/// Only the built-in codecs can be named in configuration.
impl<'de> Deserialize<'de> for Fallback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        get_fallback(&id).map_err(de::Error::custom)
    }
}

/// Get a fallback codec by its identifier.
///
/// # Known Codecs
///
/// - `"msgpack"`: MessagePack
/// - `"json"`: JSON
pub fn get_fallback(codec_id: &str) -> Result<Fallback, FallbackError> {
    match codec_id {
        "msgpack" => Ok(Fallback::MessagePack),
        "json" => Ok(Fallback::Json),
        other => Err(FallbackError::UnknownCodec(other.to_string())),
    }
}
