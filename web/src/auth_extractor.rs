//! Bearer JWT extraction for Axum handlers.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use routefare_auth::{Claims, JwtVerifier, Role};

/// The authenticated caller, attached to request extensions by
/// [`crate::middleware::CorrelationIdLayer`]'s sibling auth layer or extracted
/// directly by handlers that hold a verifier in their state.
///
/// # Examples
///
/// ```
/// use routefare_web::auth_extractor::AuthContext;
/// use routefare_auth::{Claims, Role};
/// use uuid::Uuid;
///
/// let ctx = AuthContext(Claims {
///     sub: Uuid::new_v4(),
///     role: Role::Rider,
///     exp: 0,
///     iat: 0,
///     jti: Uuid::new_v4(),
/// });
/// assert!(ctx.require_role(Role::Rider).is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct AuthContext(pub Claims);

impl AuthContext {
    /// Extract claims from a raw `Authorization` header value using `verifier`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::unauthorized`] if the header is missing, malformed,
    /// or the token fails verification.
    pub fn from_header(header: Option<&str>, verifier: &JwtVerifier) -> Result<Self, AppError> {
        let token = JwtVerifier::extract_bearer(header).map_err(|e| AppError::unauthorized(e.to_string()))?;
        let claims = verifier.verify(token).map_err(|e| AppError::unauthorized(e.to_string()))?;
        Ok(Self(claims))
    }

    /// Require that the caller holds `role` (or ADMIN).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::forbidden`] if the caller's role doesn't satisfy `role`.
    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.0.has_role(role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("requires role {role}, caller has {}", self.0.role)))
        }
    }
}

/// App state types that can hand out a [`JwtVerifier`] for extraction.
pub trait HasJwtVerifier {
    /// Returns the verifier used to authenticate inbound requests.
    fn jwt_verifier(&self) -> &JwtVerifier;
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: HasJwtVerifier + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Self::from_header(header, state.jwt_verifier())
    }
}
