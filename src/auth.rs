use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a bearer token.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the JWTs issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, the primary key of `profiles`.
    pub sub: Uuid,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request, i.e. `current_user`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument:
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is accepted.
/// 2. Token validation: `Authorization: Bearer <JWT>` decoded with the shared secret.
/// 3. DB lookup: the subject must still exist as a local profile.
///
/// Rejection: `ApiError::Unauthorized` (401) on any authentication failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get(LOCAL_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        username: user.username,
                    });
                }
            }
        }
        // Production, or a failed bypass: fall through to JWT validation.

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                kind => tracing::debug!("rejected token: {:?}", kind),
            }
            ApiError::Unauthorized
        })?;

        // The token may outlive the account.
        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}
