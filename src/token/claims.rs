//! Strict schemas for decoded credential payloads.
//!
//! Payloads are parsed into fixed structs right after decoding and validated
//! once; the rest of the crate never reads raw JSON fields.

use super::codec::{decode, DecodeError};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

/// Role label granting the elevated dashboard landing.
pub const ROLE_ADMIN: &str = "ADMIN";
/// Base role of regular members.
pub const ROLE_MEMBER: &str = "MEMBER";

/// Claims carried by the access credential.
///
/// `refreshExp` is issued in milliseconds while `iat`/`exp` are seconds.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
    pub sub: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, rename = "refreshExp")]
    refresh_exp_ms: Option<i64>,
}

impl CredentialClaims {
    /// Decodes and validates an access credential.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the token is malformed or violates the
    /// credential invariants.
    pub fn parse(token: &str) -> Result<Self, DecodeError> {
        let claims: Self = decode(token)?;
        claims.validate()?;
        Ok(claims)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.sub.trim().is_empty() {
            return Err(DecodeError::Claims("missing subject"));
        }
        if let (Some(iat), Some(exp)) = (self.iat, self.exp) {
            if exp <= iat {
                return Err(DecodeError::Claims("expiry precedes issue time"));
            }
        }
        if let (Some(exp), Some(refresh_exp)) = (self.exp, self.refresh_expires_at()) {
            if refresh_exp < exp {
                return Err(DecodeError::Claims("refresh window ends before expiry"));
            }
        }
        Ok(())
    }

    /// Refresh-window end in Unix seconds.
    #[must_use]
    pub fn refresh_expires_at(&self) -> Option<i64> {
        self.refresh_exp_ms.map(|ms| ms.div_euclid(1000))
    }

    /// `fullName`, else `name`, else the subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        [self.full_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty())
            .unwrap_or(&self.sub)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Claims carried by the verification credential.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct VerificationClaims {
    #[serde(default)]
    pub exp: Option<i64>,
}

impl VerificationClaims {
    /// # Errors
    ///
    /// Returns `DecodeError` if the token is malformed.
    pub fn parse(token: &str) -> Result<Self, DecodeError> {
        decode(token)
    }

    /// A credential without expiry is never valid.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp > now)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}
