//! Canonical payload encoding.
//!
//! The HMAC covers the exact bytes the issuer produced: compact JSON, keys
//! in insertion order, and every character outside printable ASCII escaped
//! as `\uXXXX` (lowercase hex, surrogate pairs above the BMP). Insertion
//! order comes from `serde_json`'s `preserve_order` map; the escaping comes
//! from [`AsciiFormatter`].

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io::{self, Write};

/// Compact JSON formatter that escapes everything outside `' '..='~'`.
///
/// Control characters, `"` and `\` never reach `write_string_fragment`;
/// `serde_json` routes them through `write_char_escape`, whose default
/// output (`\n`, `\u001f`, ...) already matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(fragment[start..idx].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes `value` into its canonical byte form.
///
/// # Examples
/// ```
/// let payload = serde_json::json!({"user": "Zoë", "n": 18});
/// let bytes = vault::canonical::to_vec(&payload).unwrap();
/// assert_eq!(bytes, br#"{"user":"Zo\u00eb","n":18}"#);
/// ```
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>, serde_json::Error>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn canonical(value: &Value) -> String {
        String::from_utf8(to_vec(value).unwrap()).unwrap()
    }

    #[test]
    fn test_insertion_order_preserved() {
        let parsed: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        assert_eq!(canonical(&parsed), r#"{"zeta":1,"alpha":2,"mid":3}"#);
    }

    #[test]
    fn test_no_whitespace() {
        let value = json!({"a": [1, 2, {"b": null}], "c": true});
        assert_eq!(canonical(&value), r#"{"a":[1,2,{"b":null}],"c":true}"#);
    }

    #[test]
    fn test_non_ascii_escaped() {
        let value = json!({"name": "Zoë", "emoji": "ok 😀"});
        assert_eq!(
            canonical(&value),
            r#"{"name":"Zo\u00eb","emoji":"ok \ud83d\ude00"}"#
        );
    }

    #[test]
    fn test_control_and_delete_escaped() {
        let value = json!({"s": "a\"b\\c\nd\u{1f}e\u{7f}/"});
        assert_eq!(canonical(&value), r#"{"s":"a\"b\\c\nd\u001fe\u007f/"}"#);
    }

    #[test]
    fn test_numbers_keep_their_shape() {
        let parsed: Value =
            serde_json::from_str(r#"{"i": 1730556207, "f": 1730538900.25, "w": 18.0}"#).unwrap();
        assert_eq!(
            canonical(&parsed),
            r#"{"i":1730556207,"f":1730538900.25,"w":18.0}"#
        );
    }
}
