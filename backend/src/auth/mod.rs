//! Session token validation against the identity provider's JWKS.

pub mod jwks;

pub use jwks::{AuthError, AuthUser, JwksClient};
