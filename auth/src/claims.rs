//! Claims carried by a Routefare access token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three roles recognised by the platform.
///
/// Roles are coarse-grained: finer authorization (e.g. "can this rider cancel
/// this specific booking") is still enforced by the booking/payment cores
/// themselves, not by the token alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// A rider booking trips.
    Rider,
    /// A driver operating routes.
    Driver,
    /// A platform operator with administrative privileges.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rider => write!(f, "RIDER"),
            Self::Driver => write!(f, "DRIVER"),
            Self::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Claims embedded in an access token issued to a rider, driver or admin.
///
/// Issuance (login, refresh, OTP, OAuth) is out of scope for this service —
/// tokens arrive pre-signed from the identity provider and are only verified
/// here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user's ID.
    pub sub: Uuid,
    /// Role granted to this subject.
    pub role: Role,
    /// Expiration, as a Unix timestamp (seconds).
    pub exp: i64,
    /// Issued-at, as a Unix timestamp (seconds).
    pub iat: i64,
    /// Unique token ID, used for audit-log correlation.
    pub jti: Uuid,
}

impl Claims {
    /// Returns true if `role` is permitted, given this token's role.
    ///
    /// Admins implicitly satisfy any role requirement.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role || self.role == Role::Admin
    }
}
