//! Stateless Bearer token verification.

use crate::claims::Claims;
use crate::error::AuthError;
use jsonwebtoken::{decode, DecodingKey, Validation};

/// Verifies Bearer tokens against a fixed signing key.
///
/// # Examples
///
/// ```
/// use routefare_auth::verifier::JwtVerifier;
///
/// let verifier = JwtVerifier::from_hmac_secret(b"test-secret-at-least-32-bytes-long");
/// assert!(verifier.verify("not-a-jwt").is_err());
/// ```
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier for HS256-signed tokens using a shared secret.
    #[must_use]
    pub fn from_hmac_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Build a verifier for ES256-signed tokens using a PEM-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns an error if `pem` is not a valid EC public key.
    pub fn from_es256_public_key(pem: &[u8]) -> Result<Self, AuthError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::ES256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let decoding_key = DecodingKey::from_ec_pem(pem)?;
        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Parse the `Authorization` header value and return the bearer token text.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingHeader`] if `header` is `None`, or
    /// [`AuthError::MalformedHeader`] if it isn't of the form `Bearer <token>`.
    pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedHeader)
    }

    /// Decode and validate a raw JWT, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the signature is invalid, the
    /// token has expired, or required claims are missing.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(claims: &Claims, secret: &[u8]) -> String {
        encode(&Header::new(jsonwebtoken::Algorithm::HS256), claims, &EncodingKey::from_secret(secret))
            .expect("test token should encode")
    }

    fn sample_claims(exp_delta_secs: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: uuid::Uuid::new_v4(),
            role: Role::Rider,
            exp: now + exp_delta_secs,
            iat: now,
            jti: uuid::Uuid::new_v4(),
        }
    }

    #[test]
    fn extract_bearer_accepts_well_formed_header() {
        assert_eq!(JwtVerifier::extract_bearer(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn extract_bearer_rejects_missing_and_malformed() {
        assert!(matches!(JwtVerifier::extract_bearer(None), Err(AuthError::MissingHeader)));
        assert!(matches!(JwtVerifier::extract_bearer(Some("Basic xyz")), Err(AuthError::MalformedHeader)));
        assert!(matches!(JwtVerifier::extract_bearer(Some("Bearer ")), Err(AuthError::MalformedHeader)));
    }

    #[test]
    fn verify_accepts_valid_unexpired_token() {
        let secret = b"test-secret-at-least-32-bytes-long!";
        let verifier = JwtVerifier::from_hmac_secret(secret);
        let claims = sample_claims(3600);
        let token = sign(&claims, secret);

        let decoded = verifier.verify(&token).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, Role::Rider);
    }

    #[test]
    fn verify_rejects_expired_token() {
        let secret = b"test-secret-at-least-32-bytes-long!";
        let verifier = JwtVerifier::from_hmac_secret(secret);
        let token = sign(&sample_claims(-3600), secret);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let token = sign(&sample_claims(3600), b"secret-one-at-least-32-bytes-long!!");
        let verifier = JwtVerifier::from_hmac_secret(b"secret-two-at-least-32-bytes-long!!");

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn has_role_allows_admin_override() {
        let mut claims = sample_claims(60);
        claims.role = Role::Admin;
        assert!(claims.has_role(Role::Driver));
        assert!(claims.has_role(Role::Rider));
    }

    #[test]
    fn has_role_rejects_mismatched_non_admin() {
        let mut claims = sample_claims(60);
        claims.role = Role::Rider;
        assert!(!claims.has_role(Role::Driver));
    }
}
