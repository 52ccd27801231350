//! Session identifiers assigned by backend nodes during the handshake.

use std::fmt;

/// Length of a session identifier.
pub const SESSION_ID_LEN: usize = 20;

/// A 20-character session token drawn from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Parses a session id, returning `None` for malformed tokens.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == SESSION_ID_LEN && raw.bytes().all(is_sid_byte) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_sid_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_token() {
        let sid = SessionId::parse("q1w2e3r4t5y6u7i8o9p0").unwrap();
        assert_eq!(sid.as_str(), "q1w2e3r4t5y6u7i8o9p0");
        assert_eq!(sid.to_string(), "q1w2e3r4t5y6u7i8o9p0");
    }

    #[test]
    fn test_parse_allows_dash_and_underscore() {
        assert!(SessionId::parse("AbC_-0123456789xyz_-").is_some());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("short").is_none());
        assert!(SessionId::parse("q1w2e3r4t5y6u7i8o9p0x").is_none());
    }

    #[test]
    fn test_parse_rejects_foreign_characters() {
        assert!(SessionId::parse("q1w2e3r4t5y6u7i8o9p!").is_none());
        assert!(SessionId::parse("q1w2e3r4t5 6u7i8o9p0").is_none());
        assert!(SessionId::parse("q1w2e3r4t5y6u7i8o9é").is_none());
    }
}
