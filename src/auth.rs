//! Request principal extraction.
//!
//! Handlers ask for a [`Principal`] (any authenticated user) or an
//! [`AdminPrincipal`]. Both read `Authorization: Bearer <token>` and hand the
//! token to the [`AuthGate`] registered as `Data<dyn AuthGate>`.

use crate::app_config::AuthConfig;
use crate::error::ApiError;
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use bson::oid::ObjectId;
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: ObjectId,
    pub is_admin: bool,
}

impl Principal {
    pub fn ensure_owner(&self, owner: ObjectId) -> Result<(), ApiError> {
        if self.user_id == owner {
            Ok(())
        } else {
            log::debug!("User {} is not the owner ({})", self.user_id, owner);
            Err(ApiError::forbidden("You are not the owner of this resource"))
        }
    }

    pub fn ensure_owner_or_admin(&self, owner: ObjectId) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            self.ensure_owner(owner)
        }
    }

    /// Users may only act on their own account.
    pub fn ensure_self(&self, user_id: ObjectId) -> Result<(), ApiError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("You can only access your own data"))
        }
    }
}

/// Credential check supplied to handlers.
pub trait AuthGate: Send + Sync {
    /// Resolve a bearer token, `None` when it is rejected.
    fn authenticate(&self, token: &str) -> Option<Principal>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "isAdmin", default)]
    is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
}

/// HS256 bearer token verifier.
pub struct JwtGate {
    key: Hmac<Sha256>,
    issuer: Option<String>,
}

impl JwtGate {
    pub fn new(secret: &[u8], issuer: Option<String>) -> Option<Self> {
        let key = Hmac::<Sha256>::new_from_slice(secret).ok()?;
        Some(Self { key, issuer })
    }

    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        let issuer = Some(config.issuer.clone()).filter(|i| !i.is_empty());
        if config.jwt_secret.is_empty() {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(64)
                .map(char::from)
                .collect();
            log::warn!("auth.jwt_secret is not set. Tokens are signed with a random per-process secret and will not survive a restart.");
            return Self::new(random_string.as_bytes(), issuer);
        }
        Self::new(config.jwt_secret.as_bytes(), issuer)
    }

    /// Sign a token for `principal` valid for `ttl`.
    pub fn issue(&self, principal: &Principal, ttl: chrono::Duration) -> Option<String> {
        let claims = TokenClaims {
            user_id: principal.user_id.to_hex(),
            is_admin: principal.is_admin,
            exp: Some((chrono::Utc::now() + ttl).timestamp()),
            iss: self.issuer.clone(),
        };
        claims.sign_with_key(&self.key).ok()
    }
}

impl AuthGate for JwtGate {
    fn authenticate(&self, token: &str) -> Option<Principal> {
        let claims: TokenClaims = token.verify_with_key(&self.key).ok()?;

        if let Some(exp) = claims.exp {
            if exp < chrono::Utc::now().timestamp() {
                return None;
            }
        }
        if self.issuer.is_some() && claims.iss != self.issuer {
            return None;
        }

        Some(Principal {
            user_id: ObjectId::parse_str(&claims.user_id).ok()?,
            is_admin: claims.is_admin,
        })
    }
}

fn principal_from_request(req: &HttpRequest) -> Result<Principal, ApiError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::forbidden("Malformed authorization header"))?;

    let gate = req.app_data::<Data<dyn AuthGate>>().ok_or_else(|| {
        log::error!("No AuthGate registered as app data");
        ApiError::Store(crate::store::StoreError::Backend(
            "authentication unavailable".to_string(),
        ))
    })?;

    gate.authenticate(token).ok_or_else(|| {
        log::debug!("Rejected bearer token for {}", req.path());
        ApiError::forbidden("Invalid or expired token")
    })
}

impl FromRequest for Principal {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(principal_from_request(req))
    }
}

/// A principal with `isAdmin` set.
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

impl FromRequest for AdminPrincipal {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(principal_from_request(req).and_then(|principal| {
            if principal.is_admin {
                Ok(AdminPrincipal(principal))
            } else {
                Err(ApiError::forbidden("Admin access required"))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> JwtGate {
        JwtGate::new(b"test-secret", None).unwrap()
    }

    #[test]
    fn test_issued_token_verifies() {
        let principal = Principal {
            user_id: ObjectId::new(),
            is_admin: true,
        };
        let token = gate().issue(&principal, chrono::Duration::hours(1)).unwrap();
        assert_eq!(gate().authenticate(&token), Some(principal));
    }

    #[test]
    fn test_expired_token_rejected() {
        let principal = Principal {
            user_id: ObjectId::new(),
            is_admin: false,
        };
        let token = gate().issue(&principal, chrono::Duration::hours(-1)).unwrap();
        assert!(gate().authenticate(&token).is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let principal = Principal {
            user_id: ObjectId::new(),
            is_admin: false,
        };
        let token = gate().issue(&principal, chrono::Duration::hours(1)).unwrap();
        let other = JwtGate::new(b"another-secret", None).unwrap();
        assert!(other.authenticate(&token).is_none());
    }

    #[test]
    fn test_issuer_checked_when_configured() {
        let principal = Principal {
            user_id: ObjectId::new(),
            is_admin: false,
        };
        let issuing = JwtGate::new(b"s", Some("other".to_string())).unwrap();
        let verifying = JwtGate::new(b"s", Some("bazaar".to_string())).unwrap();
        let token = issuing.issue(&principal, chrono::Duration::hours(1)).unwrap();
        assert!(verifying.authenticate(&token).is_none());
    }

    #[test]
    fn test_owner_checks() {
        let owner = ObjectId::new();
        let user = Principal {
            user_id: ObjectId::new(),
            is_admin: false,
        };
        let admin = Principal {
            user_id: ObjectId::new(),
            is_admin: true,
        };
        assert!(user.ensure_owner(owner).is_err());
        assert!(admin.ensure_owner(owner).is_err(), "Admins are not owners");
        assert!(admin.ensure_owner_or_admin(owner).is_ok());
        assert!(Principal { user_id: owner, is_admin: false }
            .ensure_owner(owner)
            .is_ok());
    }
}
