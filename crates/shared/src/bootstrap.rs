//! Script-safe encoding of bootstrap payloads.
//!
//! The payload is JSON placed inside `<script type="application/json">` and
//! read back with `JSON.parse(el.textContent)`. Everything that could end the
//! script element, open an HTML comment or terminate a JS string literal is
//! rewritten as a JSON `\uXXXX` escape, so the text is still valid JSON and
//! decodes to exactly the original value.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to encode bootstrap payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` cannot be represented as text")]
    Unrepresentable { field: String },
}

/// Serialize `value` as JSON that is safe to place verbatim inside a
/// `<script>` element or a single-quoted JS string.
pub fn encode_for_script<T: Serialize + ?Sized>(value: &T) -> Result<String, BootstrapError> {
    let json = serde_json::to_string(value)?;
    Ok(escape_script_json(&json))
}

/// Decode a payload produced by [`encode_for_script`].
pub fn decode_payload<T: DeserializeOwned>(payload: &str) -> Result<T, BootstrapError> {
    Ok(serde_json::from_str(payload)?)
}

/// Interpret stored bytes as a text field.
///
/// Text columns are not guaranteed to hold UTF-8; anything that is not is
/// reported rather than lossily replaced.
pub fn text_field(field: &str, bytes: Vec<u8>) -> Result<String, BootstrapError> {
    String::from_utf8(bytes).map_err(|_| BootstrapError::Unrepresentable {
        field: field.to_string(),
    })
}

/// Escape already-serialized JSON for an HTML script context.
///
/// `serde_json` only emits `<`, `>`, `&` and `'` inside string literals, where
/// a `\uXXXX` escape means the same character, so the rewrite never changes
/// the decoded value.
pub fn escape_script_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len() + json.len() / 8);
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            // valid in JSON strings but line terminators in older JS engines
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterView, ParticipantView, SessionView};

    const HOSTILE: &[&str] = &[
        "O'Malley the Brave",
        "\"Quoted\" Quinn",
        "</script><script>alert(1)</script>",
        "<!-- hidden -->",
        "back\\slash \\u0027 not an escape",
        "line\u{2028}separator and\u{2029}paragraph",
        "tab\tnew\nline\rreturn",
        "ampersand & friends &amp;",
        "'; drop table characters; --",
        "Ælfríð 🐉 ドラゴン",
        "",
    ];

    fn has_raw_script_hazard(s: &str) -> bool {
        s.contains('<')
            || s.contains('>')
            || s.contains('\'')
            || s.contains('&')
            || s.contains('\u{2028}')
            || s.contains('\u{2029}')
    }

    #[test]
    fn test_hostile_strings_survive_round_trip() {
        for s in HOSTILE {
            let encoded = encode_for_script(*s).unwrap();
            assert!(!has_raw_script_hazard(&encoded), "unsafe output for {s:?}: {encoded}");
            let decoded: String = decode_payload(&encoded).unwrap();
            assert_eq!(&decoded, s);
        }
    }

    #[test]
    fn test_apostrophe_is_escaped_not_doubled() {
        let encoded = encode_for_script("O'Malley the Brave").unwrap();
        assert_eq!(encoded, r#""O\u0027Malley the Brave""#);
    }

    #[test]
    fn test_backslash_is_not_double_escaped() {
        // a literal backslash followed by "u0027" must stay six characters
        let original = r"\u0027";
        let encoded = encode_for_script(original).unwrap();
        assert_eq!(encoded, r#""\\u0027""#);
        let decoded: String = decode_payload(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_session_view_round_trip_with_hostile_character() {
        let view = SessionView {
            room_id: "r-1".to_string(),
            invite_code: "QWERTY23".to_string(),
            participants: vec![ParticipantView {
                participant_id: "p-1".to_string(),
                is_creator: false,
                is_guest: true,
                joined_at: "2026-01-01T00:00:00.000000Z".to_string(),
                character: Some(CharacterView {
                    id: "c-1".to_string(),
                    name: Some("</script>O'Malley".to_string()),
                    class: Some("Bard \"of\" <Doom>".to_string()),
                }),
            }],
            omitted_fields: Vec::new(),
        };

        let encoded = encode_for_script(&view).unwrap();
        assert!(!encoded.contains("</script"));
        assert!(!has_raw_script_hazard(&encoded));

        let decoded: SessionView = decode_payload(&encoded).unwrap();
        assert_eq!(decoded, view);
    }

    #[test]
    fn test_text_field_rejects_invalid_utf8() {
        assert_eq!(text_field("name", b"Brannoc".to_vec()).unwrap(), "Brannoc");
        match text_field("class", vec![0xff, 0xfe]) {
            Err(BootstrapError::Unrepresentable { field }) => assert_eq!(field, "class"),
            other => panic!("Expected Unrepresentable, got {other:?}"),
        }
    }
}
