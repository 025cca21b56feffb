//! Connection authentication.
//!
//! Tokens are issued elsewhere; the gateway only verifies them. The
//! verified claims become the connection's [`crate::domain::Identity`].

pub mod jwt;

pub use jwt::{Claims, JwtVerifier, authenticate, extract_token};
