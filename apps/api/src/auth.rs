//! Bearer-token authentication. Tokens are issued elsewhere; this module only
//! verifies them and turns the claims into a `Principal`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{AccountStatus, Role};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    #[serde(default = "default_status")]
    pub status: AccountStatus,
    pub exp: usize,
}

fn default_status() -> AccountStatus {
    AccountStatus::Active
}

/// The authenticated actor behind a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub status: AccountStatus,
}

impl Principal {
    /// Owner-or-elevated check shared by every mutation on user-owned content.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.role.is_elevated()
    }
}

/// Verifies HS256-signed bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            AppError::Unauthenticated
        })?;
        Ok(Principal {
            id: data.claims.sub,
            role: data.claims.role,
            status: data.claims.status,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let principal = state.verifier.verify(token)?;
        if principal.status != AccountStatus::Active {
            return Err(AppError::Forbidden("account is suspended".to_string()));
        }
        Ok(principal)
    }
}

/// Optional authentication: anonymous, invalid and suspended callers all
/// come through as `None`.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let principal = bearer_token(parts)
            .and_then(|token| state.verifier.verify(token).ok())
            .filter(|p| p.status == AccountStatus::Active);
        Ok(MaybePrincipal(principal))
    }
}

#[cfg(test)]
pub(crate) fn mint_test_token(secret: &str, user_id: Uuid, role: Role, status: AccountStatus) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user_id,
        role,
        status,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("test token encodes")
}
