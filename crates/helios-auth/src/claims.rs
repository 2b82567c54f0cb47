//! Claim extraction from access tokens.
//!
//! Tokens are treated as opaque JWTs: the payload segment is decoded
//! and the configured claims namespace is read out. No signature
//! verification happens here; the server is the authority on validity.

use crate::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// Claims associated with the current access token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    values: serde_json::Map<String, Value>,
}

impl Claims {
    /// Look up a claim by name. Absent claims are `None`, never an error.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Decode the claims nested under `namespace` in the token payload.
///
/// A token whose payload lacks the namespace yields empty claims; a
/// token that is not decodable at all is an error.
pub fn decode_claims(access_token: &str, namespace: &str) -> AuthResult<Claims> {
    let payload = access_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("not a JWT".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;

    let document: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not JSON: {e}")))?;

    match document.get(namespace) {
        Some(Value::Object(values)) => Ok(Claims {
            values: values.clone(),
        }),
        _ => Ok(Claims::default()),
    }
}
