use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::jwt::{decode_hs256, encode_hs256};

use super::clock::SharedClock;
use super::directory::{Role, UserRecord};
use super::error::{RegistrationError, Service};

const INVALID_TOKEN: &str = "invalid or expired token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Purpose {
    Registration,
    Session,
}

/// Claims of the short-lived token handed out by sign-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemporaryClaims {
    purpose: Purpose,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the long-lived token proving an authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionClaims {
    purpose: Purpose,
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryCredential {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub expires_in: i64,
    pub claims: SessionClaims,
}

/// Issues and validates HS256 bearer tokens with a fixed claim schema per purpose.
pub struct CredentialIssuer {
    secret: Vec<u8>,
    clock: SharedClock,
    temporary_ttl_secs: i64,
    session_ttl_secs: i64,
}

impl CredentialIssuer {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        clock: SharedClock,
        temporary_ttl_secs: i64,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            secret: secret.into(),
            clock,
            temporary_ttl_secs,
            session_ttl_secs,
        }
    }

    pub fn issue_temporary(&self, email: &str) -> Result<TemporaryCredential, RegistrationError> {
        let iat = self.clock.now_ts();
        let claims = TemporaryClaims {
            purpose: Purpose::Registration,
            email: email.to_string(),
            iat,
            exp: expiry(iat, self.temporary_ttl_secs)?,
        };
        let token = encode_hs256(&self.secret, &claims)
            .map_err(|e| RegistrationError::transient(Service::Signer, e))?;

        Ok(TemporaryCredential {
            token,
            expires_in: self.temporary_ttl_secs,
        })
    }

    pub fn validate_temporary(&self, token: &str) -> Result<TemporaryClaims, RegistrationError> {
        let claims: TemporaryClaims = decode_hs256(&self.secret, token).map_err(|e| {
            debug!(error = %e, "rejected temporary credential");
            RegistrationError::Unauthorized(INVALID_TOKEN)
        })?;

        if claims.purpose != Purpose::Registration || self.is_expired(claims.exp) {
            return Err(RegistrationError::Unauthorized(INVALID_TOKEN));
        }
        Ok(claims)
    }

    pub fn issue_session(&self, user: &UserRecord) -> Result<SessionCredential, RegistrationError> {
        let iat = self.clock.now_ts();
        let claims = SessionClaims {
            purpose: Purpose::Session,
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat,
            exp: expiry(iat, self.session_ttl_secs)?,
        };
        let token = encode_hs256(&self.secret, &claims)
            .map_err(|e| RegistrationError::transient(Service::Signer, e))?;

        Ok(SessionCredential {
            token,
            expires_in: self.session_ttl_secs,
            claims,
        })
    }

    pub fn validate_session(&self, token: &str) -> Result<SessionClaims, RegistrationError> {
        let claims: SessionClaims = decode_hs256(&self.secret, token).map_err(|e| {
            debug!(error = %e, "rejected session credential");
            RegistrationError::Unauthorized(INVALID_TOKEN)
        })?;

        if claims.purpose != Purpose::Session || self.is_expired(claims.exp) {
            return Err(RegistrationError::Unauthorized(INVALID_TOKEN));
        }
        Ok(claims)
    }

    fn is_expired(&self, exp: i64) -> bool {
        exp <= self.clock.now_ts()
    }
}

fn expiry(iat: i64, ttl_secs: i64) -> Result<i64, RegistrationError> {
    iat.checked_add(ttl_secs)
        .ok_or_else(|| RegistrationError::transient(Service::Signer, "token lifetime out of range"))
}
