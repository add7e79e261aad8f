//! Continuation cursor

use serde::{Deserialize, Serialize};

/// Opaque continuation token issued by a remote source
///
/// Shard iterators, `NextToken` values and similar tokens all end up here.
/// The value is never inspected; it is handed back to the source verbatim
/// on the next request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a token exactly as the source returned it
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the cursor, returning the raw token
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_serializes_as_bare_string() {
        let cursor = Cursor::new("AAAAAAAAAAH");
        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, "\"AAAAAAAAAAH\"");

        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cursor);
    }
}
