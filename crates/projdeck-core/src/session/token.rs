//! Local decoding of the access token.
//!
//! Only the payload segment is read; the signature is the server's concern.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::models::Role;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

pub fn decode_claims(token: &str) -> CoreResult<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
        _ => return Err(CoreError::auth("token is not a three-part JWT")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| CoreError::auth(format!("token payload is not base64url: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::auth(format!("token payload is not valid JSON: {}", e)))
}

/// Role claim of `token`, if it decodes and carries one
pub fn decode_role(token: &str) -> CoreResult<Option<Role>> {
    Ok(decode_claims(token)?.role.as_deref().map(Role::parse))
}

#[cfg(test)]
pub(crate) fn make_token(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_admin_role() {
        let token = make_token(&json!({"sub": "kim@example.com", "role": "ROLE_ADMIN", "exp": 1900000000}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("kim@example.com"));
        assert_eq!(claims.exp, Some(1900000000));
        assert_eq!(decode_role(&token).unwrap(), Some(Role::Admin));
    }

    #[test]
    fn test_token_without_role_claim() {
        let token = make_token(&json!({"sub": "kim@example.com"}));
        assert_eq!(decode_role(&token).unwrap(), None);
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(decode_claims("garbage").is_err());
        assert!(decode_claims("a.b").is_err());
        assert!(decode_claims("a.b.c.d").is_err());
        assert!(decode_claims("header.!!!.sig").is_err());

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(matches!(decode_claims(&not_json), Err(CoreError::Auth { .. })));
    }
}
