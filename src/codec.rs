//! Opaque cursor codec for key-range bookmarks.
//!
//! Plain form: `"<secs>.<micros:06>|<identity>"`, then URL-safe base64 without
//! padding so the token can sit in a query string unescaped.
//!
//! Identities must not contain `SEPARATOR`. Store-assigned identities are hex,
//! so the constraint holds by construction.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use crate::model::Timestamp;

/// Field separator inside the decoded token.
pub const SEPARATOR: char = '|';

/// Upper bound on accepted token length; anything longer is garbage input.
pub const MAX_TOKEN_LEN: usize = 4 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Not base64 / not UTF-8 / wrong number of fields / empty fields.
    #[error("cannot decode cursor: {0}")]
    Decode(String),
    /// Fields split fine but the timestamp is not a usable real number.
    #[error("bad cursor timestamp: {0}")]
    Format(String),
}

/// Stateless encoder/decoder for (created_at, identity) bookmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueCursorCodec;

impl OpaqueCursorCodec {
    pub fn encode(created_at: Timestamp, identity: &str) -> String {
        debug_assert!(
            !identity.contains(SEPARATOR),
            "identity must not contain the cursor separator"
        );
        let plain = format!("{}{}{}", created_at, SEPARATOR, identity);
        URL_SAFE_NO_PAD.encode(plain.as_bytes())
    }

    pub fn decode(token: &str) -> Result<(Timestamp, String), CursorError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CursorError::Decode("empty token".into()));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(CursorError::Decode(format!(
                "token too long: {} chars (max {})",
                token.len(),
                MAX_TOKEN_LEN
            )));
        }

        let raw = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|e| CursorError::Decode(format!("base64: {}", e)))?;
        let plain = String::from_utf8(raw)
            .map_err(|_| CursorError::Decode("payload is not UTF-8".into()))?;

        let mut parts = plain.split(SEPARATOR);
        let (ts_part, id_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ts), Some(id), None) => (ts, id),
            _ => {
                return Err(CursorError::Decode(format!(
                    "expected 2 fields separated by '{}'",
                    SEPARATOR
                )))
            }
        };
        if id_part.is_empty() {
            return Err(CursorError::Decode("empty identity".into()));
        }

        let created_at = Timestamp::parse_secs(ts_part)
            .ok_or_else(|| CursorError::Format(format!("'{}' is not a timestamp", ts_part)))?;
        Ok((created_at, id_part.to_string()))
    }
}
