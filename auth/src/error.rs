//! Error types for Bearer JWT verification.

use thiserror::Error;

/// Errors produced while verifying an inbound Bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `Authorization` header was missing entirely.
    #[error("missing authorization header")]
    MissingHeader,

    /// The header was present but not in `Bearer <token>` form.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Token signature or claims failed validation.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Token decoded fine but the caller's role doesn't permit the action.
    #[error("role {actual} is not permitted to perform this action")]
    Forbidden {
        /// The role carried by the token.
        actual: crate::claims::Role,
    },

    /// Token decoded but referenced a subject that looks structurally wrong.
    #[error("invalid subject claim: {0}")]
    InvalidSubject(String),
}
