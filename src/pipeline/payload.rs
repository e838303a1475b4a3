//! Payload decoding: entity-escaped attribute string → nested JSON value.
//!
//! Only the five escapes that HTML serialisers emit inside attribute values
//! are recognised (`&quot;`, `&amp;`, `&#39;`, `&lt;`, `&gt;`). Replacement
//! runs one entity at a time in that order, so `&amp;lt;` decodes all the
//! way to `<`. Any other `&...;` sequence is left untouched and handed to
//! the JSON parser as-is.

use crate::error::PayloadError;
use serde_json::Value;

const ENTITIES: [(&str, &str); 5] = [
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&#39;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
];

/// Replace the five recognised HTML entities.
pub fn decode_entities(raw: &str) -> String {
    ENTITIES
        .iter()
        .fold(raw.to_string(), |acc, (entity, ch)| acc.replace(entity, ch))
}

/// Decode and parse a structured-payload attribute.
pub fn decode_payload(raw: &str) -> Result<Value, PayloadError> {
    if raw.trim().is_empty() {
        return Err(PayloadError::Empty);
    }
    let decoded = decode_entities(raw);
    Ok(serde_json::from_str(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_quoted_payload() {
        let raw = "{&quot;teaser-1&quot;:{&quot;@type&quot;:&quot;core/teaser&quot;}}";
        let v = decode_payload(raw).unwrap();
        assert_eq!(v, json!({"teaser-1": {"@type": "core/teaser"}}));
    }

    #[test]
    fn decodes_all_five_entities() {
        assert_eq!(
            decode_entities("&quot;&amp;&#39;&lt;&gt;"),
            "\"&'<>"
        );
    }

    #[test]
    fn amp_is_decoded_before_lt_and_gt() {
        assert_eq!(decode_entities("&amp;lt;b&amp;gt;"), "<b>");
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(decode_entities("&nbsp;&#x27;"), "&nbsp;&#x27;");
    }

    #[test]
    fn plain_json_is_accepted() {
        let v = decode_payload(r#"{"a":1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            decode_payload("{&quot;a&quot;:"),
            Err(PayloadError::Parse { .. })
        ));
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert!(matches!(decode_payload("  "), Err(PayloadError::Empty)));
    }
}
