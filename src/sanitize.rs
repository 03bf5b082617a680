//! NUL sanitization for record strings.
//!
//! Postgres rejects text values containing the NUL character, while the
//! source service happily emits them (roughly one record in a billion).
//! Before any field extraction happens, every string leaf of the raw record
//! is rewritten under one of two policies:
//!
//! - [`NulPolicy::Strip`] drops the character entirely (row strategy);
//! - [`NulPolicy::Escape`] replaces it with the visible text `\x00` so the
//!   original string can be reconstructed by reversing the escape (batch
//!   strategy, which keeps a denormalized copy that must stay comparable).

use serde_json::Value;

/// The literal text substituted for a NUL under [`NulPolicy::Escape`].
pub const NUL_ESCAPE: &str = "\\x00";

/// How to rewrite NUL characters embedded in record strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NulPolicy {
    /// Remove each NUL character entirely.
    Strip,
    /// Replace each NUL character with [`NUL_ESCAPE`].
    Escape,
}

impl NulPolicy {
    /// Apply the policy to a single string.
    #[must_use]
    pub fn apply(self, s: &str) -> String {
        match self {
            Self::Strip => s.replace('\0', ""),
            Self::Escape => s.replace('\0', NUL_ESCAPE),
        }
    }
}

/// Rewrite every string leaf of `value` in place, recursively.
///
/// Objects and arrays are walked to any depth; non-string leaves pass
/// through untouched. Strings without a NUL are left as-is, so the common
/// case allocates nothing.
pub fn sanitize_value(value: &mut Value, policy: NulPolicy) {
    match value {
        Value::String(s) => {
            if s.contains('\0') {
                *s = policy.apply(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item, policy);
            }
        }
        Value::Object(map) => {
            for (_key, item) in map.iter_mut() {
                sanitize_value(item, policy);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{NUL_ESCAPE, NulPolicy, sanitize_value};
    use serde_json::json;

    #[test]
    fn strip_removes_nuls() {
        assert_eq!(NulPolicy::Strip.apply("\0"), "");
        assert_eq!(NulPolicy::Strip.apply("hello\0 world"), "hello world");
        assert_eq!(NulPolicy::Strip.apply("clean"), "clean");
    }

    #[test]
    fn strip_never_grows_the_string() {
        for input in ["\0\0\0", "a\0b", "plain"] {
            assert!(NulPolicy::Strip.apply(input).len() <= input.len());
        }
    }

    #[test]
    fn escape_is_reversible() {
        let original = "hello\0 world\0";
        let escaped = NulPolicy::Escape.apply(original);
        assert!(!escaped.contains('\0'));
        assert_eq!(escaped.replace(NUL_ESCAPE, "\0"), original);
    }

    #[test]
    fn sanitize_walks_nested_structures() {
        let mut value = json!({
            "text": "a\0b",
            "user": {"name": "x\0", "id": 7},
            "entities": {"hashtags": [{"text": "tag\0"}]},
            "flag": true,
        });
        sanitize_value(&mut value, NulPolicy::Strip);
        assert_eq!(value["text"], "ab");
        assert_eq!(value["user"]["name"], "x");
        assert_eq!(value["user"]["id"], 7);
        assert_eq!(value["entities"]["hashtags"][0]["text"], "tag");
        assert_eq!(value["flag"], true);
    }

    #[test]
    fn sanitize_escape_mode_marks_nuls() {
        let mut value = json!(["a\0"]);
        sanitize_value(&mut value, NulPolicy::Escape);
        assert_eq!(value[0], "a\\x00");
    }
}
