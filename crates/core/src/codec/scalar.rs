//! Scalar types the store represents natively
//!
//! Canonical text encodings:
//! - integers and floats: decimal
//! - `Duration`: whole nanoseconds, decimal
//! - `bool`: `"true"` / `"false"` (`"1"` / `"0"` also accepted on read)
//! - `String`: verbatim

use crate::field::ValueType;
use std::time::Duration;

/// A type the store represents directly
pub trait Scalar: Default + Send + Sync + 'static {
    /// Semantic value type
    const VALUE_TYPE: ValueType;

    /// Rust type name for schema descriptions and errors
    const TYPE_NAME: &'static str;

    /// Canonical text encoding
    fn encode_text(&self) -> String;

    /// Parse the canonical text encoding
    ///
    /// Returns `None` when the text is not a valid encoding.
    fn decode_text(text: &str) -> Option<Self>;
}

macro_rules! numeric_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const VALUE_TYPE: ValueType = ValueType::Numeric;
                const TYPE_NAME: &'static str = stringify!($ty);

                fn encode_text(&self) -> String {
                    self.to_string()
                }

                fn decode_text(text: &str) -> Option<Self> {
                    text.parse().ok()
                }
            }
        )*
    };
}

numeric_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Scalar for bool {
    const VALUE_TYPE: ValueType = ValueType::Boolean;
    const TYPE_NAME: &'static str = "bool";

    fn encode_text(&self) -> String {
        let text = if *self { "true" } else { "false" };
        text.to_string()
    }

    fn decode_text(text: &str) -> Option<Self> {
        match text {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

impl Scalar for String {
    const VALUE_TYPE: ValueType = ValueType::Text;
    const TYPE_NAME: &'static str = "String";

    fn encode_text(&self) -> String {
        self.clone()
    }

    fn decode_text(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

impl Scalar for Duration {
    const VALUE_TYPE: ValueType = ValueType::Numeric;
    const TYPE_NAME: &'static str = "Duration";

    fn encode_text(&self) -> String {
        self.as_nanos().to_string()
    }

    fn decode_text(text: &str) -> Option<Self> {
        let nanos: u128 = text.parse().ok()?;
        let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
        let subsec = (nanos % 1_000_000_000) as u32;
        Some(Duration::new(secs, subsec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_is_decimal() {
        assert_eq!((-42i64).encode_text(), "-42");
        assert_eq!(u64::MAX.encode_text(), "18446744073709551615");
        assert_eq!(i8::decode_text("-128"), Some(-128));
        assert_eq!(u8::decode_text("256"), None);
    }

    #[test]
    fn test_float_round_trips_exactly() {
        for value in [0.1f64, -1.5, 1e300, f64::MIN_POSITIVE, f64::INFINITY] {
            assert_eq!(f64::decode_text(&value.encode_text()), Some(value));
        }
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(true.encode_text(), "true");
        assert_eq!(false.encode_text(), "false");
        assert_eq!(bool::decode_text("1"), Some(true));
        assert_eq!(bool::decode_text("0"), Some(false));
        assert_eq!(bool::decode_text("yes"), None);
    }

    #[test]
    fn test_string_is_verbatim() {
        let text = "hello\tworld ✓".to_string();
        assert_eq!(text.encode_text(), text);
        assert_eq!(String::decode_text(""), Some(String::new()));
    }

    #[test]
    fn test_duration_as_nanoseconds() {
        let d = Duration::from_secs(43);
        assert_eq!(d.encode_text(), "43000000000");
        assert_eq!(Duration::decode_text("43000000001"), Some(Duration::new(43, 1)));
        assert_eq!(Duration::decode_text("-1"), None);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(<i32 as Scalar>::VALUE_TYPE, ValueType::Numeric);
        assert_eq!(<bool as Scalar>::VALUE_TYPE, ValueType::Boolean);
        assert_eq!(<String as Scalar>::VALUE_TYPE, ValueType::Text);
        assert_eq!(<Duration as Scalar>::VALUE_TYPE, ValueType::Numeric);
    }
}
