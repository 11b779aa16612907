//! Canonical JSON serialization (RFC 8785, JSON Canonicalization Scheme)
//!
//! Every byte that gets signed or hashed as JSON goes through this module.
//! Two documents that are equal as JSON values produce identical bytes here,
//! whatever order their keys were inserted in.
//!
//! # Rules
//!
//! 1. Object keys are sorted by UTF-16 code units, not by UTF-8 bytes.
//! 2. No whitespace between tokens.
//! 3. Strings use the minimal escape set: `"`, `\`, and control characters.
//!    Everything else, including non-ASCII, is written literally.
//! 4. Numbers are IEEE-754 doubles printed with the shortest round-tripping
//!    form (ECMAScript `Number.prototype.toString`). Non-finite values are
//!    rejected.
//! 5. `null`, `true`, `false` are written literally.

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while producing canonical bytes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalizationError {
    /// NaN or infinity has no JSON representation
    #[error("Cannot canonicalize non-finite number: {0}")]
    NonFiniteNumber(f64),

    /// The value could not be turned into a JSON document at all
    #[error("Cannot canonicalize value: {0}")]
    Unsupported(String),
}

/// Canonicalize a JSON value into its RFC 8785 byte form
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let mut buf = Vec::with_capacity(256);
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Canonicalize a JSON value and return it as a `String`
pub fn canonicalize_to_string(value: &Value) -> Result<String, CanonicalizationError> {
    let bytes = canonicalize(value)?;
    // write_value only ever emits valid UTF-8
    String::from_utf8(bytes).map_err(|e| CanonicalizationError::Unsupported(e.to_string()))
}

/// Serialize any `Serialize` type and canonicalize the result
///
/// Types whose serialization is not a JSON document (maps with non-string
/// keys, for instance) are reported as [`CanonicalizationError::Unsupported`].
pub fn to_canonical_bytes<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, CanonicalizationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CanonicalizationError::Unsupported(e.to_string()))?;
    canonicalize(&value)
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| CanonicalizationError::Unsupported(n.to_string()))?;
            buf.extend_from_slice(format_number(f)?.as_bytes());
        }
        Value::String(s) => write_string(buf, s),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_value(buf, item)?;
            }
            buf.push(b']');
        }
        Value::Object(map) => write_object(buf, map)?,
    }
    Ok(())
}

fn write_object(buf: &mut Vec<u8>, map: &Map<String, Value>) -> Result<(), CanonicalizationError> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

    buf.push(b'{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        write_string(buf, key);
        buf.push(b':');
        write_value(buf, value)?;
    }
    buf.push(b'}');
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\u{0008}' => buf.extend_from_slice(b"\\b"),
            '\u{000C}' => buf.extend_from_slice(b"\\f"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            c if c < '\u{0020}' => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => {
                let mut utf8 = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    buf.push(b'"');
}

/// Format a double the way ECMAScript `Number.prototype.toString` does
///
/// Rust's `{:e}` formatting already yields the shortest digit string that
/// round-trips, so only the placement of the decimal point and exponent
/// differs from JavaScript.
pub fn format_number(value: f64) -> Result<String, CanonicalizationError> {
    if !value.is_finite() {
        return Err(CanonicalizationError::NonFiniteNumber(value));
    }
    if value == 0.0 {
        // covers -0 as well
        return Ok("0".to_string());
    }

    let sci = format!("{:e}", value.abs());
    let (mantissa, exponent) = sci
        .split_once('e')
        .ok_or_else(|| CanonicalizationError::Unsupported(sci.clone()))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| CanonicalizationError::Unsupported(sci.clone()))?;
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let k = digits.len() as i32;
    let n = exponent + 1;

    let mut out = String::with_capacity(k as usize + 8);
    if value < 0.0 {
        out.push('-');
    }

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        out.push_str(int_part);
        out.push('.');
        out.push_str(frac_part);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let e = n - 1;
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        out.push('e');
        out.push(if e < 0 { '-' } else { '+' });
        out.push_str(&e.abs().to_string());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(v: &Value) -> String {
        canonicalize_to_string(v).unwrap()
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(canon(&json!({})), "{}");
        assert_eq!(canon(&json!([])), "[]");
    }

    #[test]
    fn test_literals() {
        assert_eq!(canon(&json!(null)), "null");
        assert_eq!(canon(&json!([true, false])), "[true,false]");
    }

    #[test]
    fn test_sorted_keys_independent_of_insertion_order() {
        let a: Value = serde_json::from_str(r#"{"b":2,"a":1,"c":3}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"c":3,"a":1,"b":2}"#).unwrap();
        assert_eq!(canon(&a), r#"{"a":1,"b":2,"c":3}"#);
        assert_eq!(canon(&a), canon(&b));
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let v = json!({"z": {"y": 1, "x": [{"b": 1, "a": 2}]}, "a": null});
        assert_eq!(canon(&v), r#"{"a":null,"z":{"x":[{"a":2,"b":1}],"y":1}}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        assert_eq!(canon(&json!([3, 1, 2])), "[3,1,2]");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            canon(&json!({"numbers": [1, 2.5, 1e30]})),
            r#"{"numbers":[1,2.5,1e+30]}"#
        );
    }

    #[test]
    fn test_format_number_es_rules() {
        let cases: &[(f64, &str)] = &[
            (0.0, "0"),
            (-0.0, "0"),
            (1.0, "1"),
            (-1.0, "-1"),
            (100.0, "100"),
            (123.456, "123.456"),
            (0.5, "0.5"),
            (0.000001, "0.000001"),
            (0.0000001, "1e-7"),
            (1.5e-7, "1.5e-7"),
            (1e21, "1e+21"),
            (1e20, "100000000000000000000"),
            (123456789012345680000.0, "123456789012345680000"),
            (4.35, "4.35"),
            (0.1 + 0.2, "0.30000000000000004"),
            (9007199254740992.0, "9007199254740992"),
            (5e-324, "5e-324"),
            (1.7976931348623157e308, "1.7976931348623157e+308"),
        ];
        for (input, expected) in cases {
            assert_eq!(format_number(*input).unwrap(), *expected, "input {input:e}");
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            format_number(f64::NAN),
            Err(CanonicalizationError::NonFiniteNumber(_))
        ));
        assert!(format_number(f64::INFINITY).is_err());
        assert!(format_number(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_large_integers_follow_double_precision() {
        assert_eq!(canon(&json!(u64::MAX)), "18446744073709552000");
        assert_eq!(canon(&json!(-42i64)), "-42");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(
            canon(&json!({"text": "hello\n\"world\"\t"})),
            r#"{"text":"hello\n\"world\"\t"}"#
        );
        assert_eq!(canon(&json!("a\\b")), r#""a\\b""#);
        assert_eq!(canon(&json!("\u{0008}\u{000C}\r")), r#""\b\f\r""#);
        assert_eq!(canon(&json!("\u{0001}\u{001f}")), r#""\u0001\u001f""#);
    }

    #[test]
    fn test_no_superfluous_escaping() {
        assert_eq!(canon(&json!("/ < > & '")), r#""/ < > & '""#);
        assert_eq!(canon(&json!("\u{007f}")), "\"\u{007f}\"");
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let v = json!({"name": "café €", "emoji": "😀"});
        let out = canon(&v);
        assert_eq!(out, "{\"emoji\":\"😀\",\"name\":\"café €\"}");
    }

    #[test]
    fn test_utf16_key_ordering() {
        // U+FF61 sorts before U+1F600 by UTF-8 bytes, but the emoji's high
        // surrogate 0xD83D sorts before 0xFF61 as UTF-16
        let v = json!({"\u{FF61}": 2, "\u{1F600}": 1, "a": 3});
        assert_eq!(canon(&v), "{\"a\":3,\"\u{1F600}\":1,\"\u{FF61}\":2}");
    }

    #[test]
    fn test_rfc8785_sample_ordering() {
        let v: Value = serde_json::from_str(
            r#"{"\u20ac":"Euro Sign","\r":"Carriage Return","\ufb33":"Hebrew Letter Dalet With Dagesh","1":"One","\ud83d\ude00":"Emoji: Grinning Face","\u0080":"Control","\u00f6":"Latin Small Letter O With Diaeresis"}"#,
        )
        .unwrap();
        let out = canon(&v);
        let expected = "{\"\\r\":\"Carriage Return\",\"1\":\"One\",\"\u{0080}\":\"Control\",\"\u{00f6}\":\"Latin Small Letter O With Diaeresis\",\"\u{20ac}\":\"Euro Sign\",\"\u{1F600}\":\"Emoji: Grinning Face\",\"\u{fb33}\":\"Hebrew Letter Dalet With Dagesh\"}";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_to_canonical_bytes_from_struct() {
        #[derive(Serialize)]
        struct Doc {
            zeta: u32,
            alpha: &'static str,
        }
        let bytes = to_canonical_bytes(&Doc { zeta: 7, alpha: "x" }).unwrap();
        assert_eq!(bytes, br#"{"alpha":"x","zeta":7}"#);
    }
}
