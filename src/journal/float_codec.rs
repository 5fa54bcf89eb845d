//! Special float codec - non-finite sentinels in strict JSON
//!
//! Strict JSON has no literal for infinity or not-a-number, so journal
//! writers carry them as the string sentinels `"Infinity"`, `"-Infinity"` and
//! `"NaN"`. Every numeric field that may be non-finite goes through
//! [`decode`] at the decode boundary, and through [`encode`] when the
//! reconstructed model is serialized again.

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Sentinel for positive infinity
pub const POSITIVE_INFINITY: &str = "Infinity";
/// Sentinel for negative infinity
pub const NEGATIVE_INFINITY: &str = "-Infinity";
/// Sentinel for not-a-number
pub const NOT_A_NUMBER: &str = "NaN";

// Longest first so "-Infinity" wins over "Infinity" at the same position.
const SENTINELS: [&str; 3] = [NEGATIVE_INFINITY, POSITIVE_INFINITY, NOT_A_NUMBER];

/// Decode a single token into a float.
///
/// Sentinels map onto the IEEE-754 special values; anything else must be an
/// ordinary finite decimal or exponential literal.
///
/// ```rust
/// use trueno_journal::journal::float_codec::decode_token;
///
/// assert_eq!(decode_token("-Infinity"), Some(f64::NEG_INFINITY));
/// assert!(decode_token("NaN").is_some_and(f64::is_nan));
/// assert_eq!(decode_token("1e-3"), Some(0.001));
/// assert_eq!(decode_token("inf"), None);
/// ```
#[must_use]
pub fn decode_token(token: &str) -> Option<f64> {
    match token {
        POSITIVE_INFINITY => Some(f64::INFINITY),
        NEGATIVE_INFINITY => Some(f64::NEG_INFINITY),
        NOT_A_NUMBER => Some(f64::NAN),
        // Rust's parser also accepts "inf"/"nan" spellings; only sentinels may be non-finite.
        literal => literal.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Decode a JSON value holding either a number or a sentinel string.
#[must_use]
pub fn decode(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(token) => decode_token(token),
        _ => None,
    }
}

/// Encode a float as a JSON value, substituting sentinels for non-finite values.
#[must_use]
pub fn encode(value: f64) -> Value {
    if value.is_nan() {
        Value::String(NOT_A_NUMBER.to_string())
    } else if value == f64::INFINITY {
        Value::String(POSITIVE_INFINITY.to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String(NEGATIVE_INFINITY.to_string())
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Quote bare `Infinity`, `-Infinity` and `NaN` tokens appearing outside
/// string literals.
///
/// Optuna workers write these tokens bare. The text is borrowed back
/// unchanged when there is nothing to quote.
///
/// ```rust
/// use trueno_journal::journal::float_codec::quote_bare_tokens;
///
/// let fixed = quote_bare_tokens(r#"{"values": [-Infinity, NaN], "s": "NaN"}"#);
/// assert_eq!(fixed, r#"{"values": ["-Infinity", "NaN"], "s": "NaN"}"#);
/// ```
#[must_use]
pub fn quote_bare_tokens(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut quoted: Option<String> = None;
    let mut copied = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if byte == b'"' {
            in_string = true;
            i += 1;
            continue;
        }

        if let Some(token) = bare_token_at(bytes, i) {
            let buf = quoted.get_or_insert_with(|| String::with_capacity(text.len() + 8));
            buf.push_str(&text[copied..i]);
            buf.push('"');
            buf.push_str(token);
            buf.push('"');
            i += token.len();
            copied = i;
            continue;
        }

        i += 1;
    }

    match quoted {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

fn bare_token_at(bytes: &[u8], at: usize) -> Option<&'static str> {
    if at > 0 && is_word_byte(bytes[at - 1]) {
        return None;
    }
    SENTINELS.into_iter().find(|token| {
        let end = at + token.len();
        bytes.get(at..end) == Some(token.as_bytes())
            && bytes.get(end).map_or(true, |&next| !is_word_byte(next))
    })
}

const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Serialize a float through [`encode`].
///
/// # Errors
///
/// Returns the serializer's error.
pub fn serialize_f64<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    encode(*value).serialize(serializer)
}

/// Serialize a float sequence through [`encode`].
///
/// # Errors
///
/// Returns the serializer's error.
pub fn serialize_values<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|&v| encode(v)))
}

/// Serialize an optional float sequence through [`encode`].
///
/// # Errors
///
/// Returns the serializer's error.
#[allow(clippy::ref_option)]
pub fn serialize_opt_values<S: Serializer>(
    values: &Option<Vec<f64>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match values {
        Some(values) => {
            serializer.serialize_some(&values.iter().map(|&v| encode(v)).collect::<Vec<_>>())
        }
        None => serializer.serialize_none(),
    }
}

/// Serialize a step-indexed float map through [`encode`].
///
/// # Errors
///
/// Returns the serializer's error.
pub fn serialize_steps<S: Serializer>(
    steps: &BTreeMap<u64, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(steps.iter().map(|(step, &v)| (step, encode(v))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_sentinels() {
        assert_eq!(decode(&json!("Infinity")), Some(f64::INFINITY));
        assert_eq!(decode(&json!("-Infinity")), Some(f64::NEG_INFINITY));
        assert!(decode(&json!("NaN")).unwrap().is_nan());
    }

    #[test]
    fn test_decode_numbers() {
        assert_eq!(decode(&json!(1.5)), Some(1.5));
        assert_eq!(decode(&json!(-3)), Some(-3.0));
        assert_eq!(decode(&json!("2.5e2")), Some(250.0));
    }

    #[test]
    fn test_decode_rejects_other_shapes() {
        assert_eq!(decode(&json!(null)), None);
        assert_eq!(decode(&json!(true)), None);
        assert_eq!(decode(&json!([1.0])), None);
        assert_eq!(decode(&json!("infinity")), None);
        assert_eq!(decode(&json!("abc")), None);
    }

    #[test]
    fn test_encode_special_values() {
        assert_eq!(encode(f64::INFINITY), json!("Infinity"));
        assert_eq!(encode(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(encode(f64::NAN), json!("NaN"));
        assert_eq!(encode(0.25), json!(0.25));
    }

    #[test]
    fn test_quote_bare_tokens_leaves_strings_alone() {
        let text = r#"{"k": "say \"NaN\" Infinity"}"#;
        assert!(matches!(quote_bare_tokens(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_quote_bare_tokens_respects_word_boundaries() {
        let text = r#"{"NaNx": 1, "v": NaNx}"#;
        assert!(matches!(quote_bare_tokens(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_quote_bare_tokens_rewrites_values() {
        let text = r#"{"op_code": 8, "intermediate_value": -Infinity}"#;
        let fixed = quote_bare_tokens(text);
        assert_eq!(fixed, r#"{"op_code": 8, "intermediate_value": "-Infinity"}"#);
        let parsed: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(decode(&parsed["intermediate_value"]), Some(f64::NEG_INFINITY));
    }
}
