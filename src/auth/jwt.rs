//! HS256 access-token verification for WebSocket upgrades.

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::domain::Identity;

/// Cookie that carries the access token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "qtp_access_token";

/// Claims the authentication service embeds in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: String,
    /// Role names granted to the user.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity::new(claims.sub, claims.roles)
    }
}

/// Verifies access tokens against a shared HMAC secret.
#[derive(Clone)]
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    /// Creates a verifier for the given HS256 secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Validates and decodes an access token.
    ///
    /// Checks the signature and the `exp` claim.
    ///
    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error when the token is malformed,
    /// expired or signed with another secret.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Finds the access token of an upgrade request.
///
/// Looks at, in order: the `token` query parameter, an
/// `Authorization: Bearer` header, and the [`ACCESS_TOKEN_COOKIE`] cookie.
#[must_use]
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1))
    {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves the identity of an upgrade request.
///
/// Returns `None` when no token is present or it fails verification; the
/// connection is still accepted and treated as unauthenticated.
#[must_use]
pub fn authenticate(
    verifier: &JwtVerifier,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Option<Identity> {
    let Some(token) = extract_token(headers, query_token) else {
        tracing::debug!("ws upgrade without access token");
        return None;
    };
    match verifier.verify(&token) {
        Ok(claims) => Some(claims.into()),
        Err(err) => {
            tracing::warn!(error = %err, "ws upgrade with invalid access token");
            None
        }
    }
}
