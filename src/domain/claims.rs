//! Typed view over the claims carried by an access token.
//!
//! The backend issues ASP.NET identity tokens, so the interesting claims are
//! keyed by long XML-schema URIs. Only the subject, email, given name and
//! surname are consumed (plus `exp` and the role claim for admin checks).

use crate::domain::models::UserIdentity;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const SUBJECT_CLAIM: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
pub const EMAIL_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";
pub const GIVEN_NAME_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname";
pub const SURNAME_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname";
pub const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier")]
    subject: Option<String>,
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress")]
    email: Option<String>,
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname")]
    given_name: Option<String>,
    #[serde(rename = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname")]
    surname: Option<String>,
    #[serde(rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role")]
    role: Option<RoleClaim>,
    exp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
enum RoleClaim {
    Single(String),
    Many(Vec<String>),
}

/// Fallback values used when the token omits a non-required claim.
#[derive(Debug, Clone, Default)]
pub struct IdentityFallback {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AccessTokenClaims {
    pub fn subject(&self) -> Option<&str> {
        non_empty(self.subject.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(self.email.as_deref())
    }

    pub fn given_name(&self) -> Option<&str> {
        non_empty(self.given_name.as_deref())
    }

    pub fn surname(&self) -> Option<&str> {
        non_empty(self.surname.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// A token without `exp` never expires locally; the backend stays the authority.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at < now)
    }

    pub fn is_admin(&self) -> bool {
        match &self.role {
            Some(RoleClaim::Single(role)) => role.eq_ignore_ascii_case(ADMIN_ROLE),
            Some(RoleClaim::Many(roles)) => {
                roles.iter().any(|role| role.eq_ignore_ascii_case(ADMIN_ROLE))
            }
            None => false,
        }
    }

    /// Builds the user identity. Returns `None` when the subject claim is
    /// missing; callers must treat that as a fatal session error.
    pub fn identity(&self, fallback: &IdentityFallback) -> Option<UserIdentity> {
        let id = self.subject()?;
        Some(UserIdentity {
            id: id.to_string(),
            email: self
                .email()
                .map(ToOwned::to_owned)
                .or_else(|| fallback.email.clone())
                .unwrap_or_default(),
            first_name: self
                .given_name()
                .map(ToOwned::to_owned)
                .or_else(|| fallback.first_name.clone())
                .unwrap_or_default(),
            last_name: self
                .surname()
                .map(ToOwned::to_owned)
                .or_else(|| fallback.last_name.clone())
                .unwrap_or_default(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
