//! Unverified decoding of three-segment signed credentials.
//!
//! Only the payload segment is read. The signature is never checked here; the
//! backend verifies every credential it receives, and the client only needs the
//! claims to drive its own state.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid claims: {0}")]
    Claims(&'static str),
}

/// Decodes the payload segment into `T`.
///
/// # Errors
///
/// Returns `DecodeError::Format` unless the token has exactly three
/// dot-delimited segments, `DecodeError::Base64` if the payload is not
/// base64url, and `DecodeError::Json` if it does not parse into `T`.
pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, DecodeError> {
    let bytes = payload_bytes(token)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decodes the payload segment as untyped JSON.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_payload(token: &str) -> Result<Value, DecodeError> {
    decode(token)
}

fn payload_bytes(token: &str) -> Result<Vec<u8>, DecodeError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(DecodeError::Format);
    }

    // some issuers keep the padding
    let payload = parts[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(DecodeError::Format);
    }

    Base64UrlUnpadded::decode_vec(payload).map_err(|_| DecodeError::Base64)
}

#[cfg(test)]
mod tests {
    use super::{decode, decode_payload, DecodeError};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde::Deserialize;
    use serde_json::json;

    fn token_for(payload: &serde_json::Value) -> String {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_payload_without_checking_signature() {
        let token = token_for(&json!({ "sub": "alice", "exp": 10 }));
        let payload = decode_payload(&token).unwrap();
        assert_eq!(payload["sub"], "alice");
        assert_eq!(payload["exp"], 10);
    }

    #[test]
    fn decodes_into_typed_struct() {
        #[derive(Deserialize)]
        struct Exp {
            exp: i64,
        }
        let token = token_for(&json!({ "exp": 42 }));
        let parsed: Exp = decode(&token).unwrap();
        assert_eq!(parsed.exp, 42);
    }

    #[test]
    fn tolerates_padded_payload() {
        let body = base64ct::Base64Url::encode_string(br#"{"sub":"a"}"#);
        assert!(body.ends_with('='));
        let token = format!("h.{body}.s");
        assert_eq!(decode_payload(&token).unwrap()["sub"], "a");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(decode_payload("a.b"), Err(DecodeError::Format)));
        assert!(matches!(decode_payload("a.b.c.d"), Err(DecodeError::Format)));
        assert!(matches!(decode_payload(""), Err(DecodeError::Format)));
        assert!(matches!(decode_payload("a..c"), Err(DecodeError::Format)));
    }

    #[test]
    fn rejects_bad_base64_and_bad_json() {
        assert!(matches!(decode_payload("a.!!!.c"), Err(DecodeError::Base64)));

        let not_json = Base64UrlUnpadded::encode_string(b"not json");
        assert!(matches!(
            decode_payload(&format!("a.{not_json}.c")),
            Err(DecodeError::Json(_))
        ));
    }
}
