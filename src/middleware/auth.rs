//! Authentication middleware
//!
//! Bearer JWT authentication for API routes. The WebSocket route carries its
//! token in the `sec-websocket-protocol` header and authenticates itself.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::entity::user::UserStatus;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::UserRepo;

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing and verification keys
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire: i64,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            expire: config.expire,
        }
    }

    /// Token lifetime in seconds
    pub fn expire(&self) -> i64 {
        self.expire
    }

    pub fn issue(&self, user_id: &str, now: i64) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.expire,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                AppError::Unauthorized
            })
    }
}

/// Authenticated caller, stored in request extensions
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub is_system: bool,
}

impl CurrentUser {
    /// Administrative operations are reserved for system accounts
    pub fn require_system(&self) -> AppResult<()> {
        if self.is_system {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "only system accounts may perform this operation".to_string(),
            ))
        }
    }
}

/// Resolve a bearer token to the user it was issued for
pub async fn authenticate(
    keys: &JwtKeys,
    users: &dyn UserRepo,
    token: &str,
) -> AppResult<CurrentUser> {
    let claims = keys.verify(token)?;
    let Some(user) = users.find(&claims.sub).await? else {
        tracing::warn!("Token subject no longer exists: {}", claims.sub);
        return Err(AppError::Unauthorized);
    };
    if user.user_status() == UserStatus::Disabled {
        return Err(AppError::Forbidden("account is disabled".to_string()));
    }
    Ok(CurrentUser {
        id: user.id,
        name: user.name,
        is_system: user.is_system,
    })
}

/// Paths that don't require a bearer token
fn is_public_path(path: &str) -> bool {
    matches!(path, "/v1/user/login" | "/health" | "/ws")
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>()
    else {
        return AppError::Unauthorized.into_response();
    };

    match authenticate(&state.jwt, state.stores.users.as_ref(), bearer.token()).await {
        Ok(current_user) => {
            request.extensions_mut().insert(current_user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".to_string(),
            expire: 3600,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let now = chrono::Utc::now().timestamp();
        let token = keys.issue("u1", now).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp, now + 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let long_ago = chrono::Utc::now().timestamp() - 2 * 3600;
        let token = keys.issue("u1", long_ago).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = JwtKeys::new(&JwtConfig {
            secret: "other".to_string(),
            expire: 3600,
        });
        let token = other.issue("u1", chrono::Utc::now().timestamp()).unwrap();
        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/v1/user/login"));
        assert!(is_public_path("/ws"));
        assert!(!is_public_path("/v1/user/list"));
    }
}
