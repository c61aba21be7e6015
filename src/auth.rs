use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    repository::RepositoryState,
};

/// Claims
///
/// The JWT payload this API accepts. Tokens are signed with the server's
/// secret; `sub` names the users-table row the request acts as.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id (users.id).
    pub sub: i64,
    /// Expiration timestamp; tokens past it are rejected.
    pub exp: usize,
    /// Issued-at timestamp.
    pub iat: usize,
}

/// AuthUser
///
/// The caller's resolved identity. Taking this as a handler argument is what
/// marks a handler as authenticated; the create and upload handlers further
/// require `role == "ADMIN"`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    /// 'USER' or 'ADMIN'.
    pub role: String,
}

/// Development shortcut: in `Env::Local` a request may authenticate by naming
/// an existing user id in the `x-user-id` header. The id must resolve against
/// the users table so the role attached to it is a real one. Returns None
/// when the header is absent or does not name a known user, in which case the
/// normal bearer-token flow takes over.
async fn local_bypass(parts: &Parts, repo: &RepositoryState) -> Option<AuthUser> {
    let user_id = parts
        .headers
        .get("x-user-id")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;

    let user = repo.find_user(user_id).await.ok()??;
    Some(AuthUser {
        id: user.id,
        role: user.role,
    })
}

/// Extractor implementation. Authentication lives entirely here, outside the
/// handlers: bearer token extraction, JWT validation against the configured
/// secret, and a users-table lookup so a token for a since-deleted user stops
/// working. Every rejection is an [`ApiError::Unauthorized`] so auth failures
/// ride the same structured error channel as the rest of the API.
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
            if let Some(user) = local_bypass(parts, &repo).await {
                return Ok(user);
            }
        }

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("the request carries no authorization"))?;

        let token = bearer.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::unauthorized("the authorization header is not a bearer token")
        })?;

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| ApiError::unauthorized("the token is invalid or expired"))?;

        // The token can verify while the user it names is gone; the row in the
        // users table is what actually grants access (and carries the role).
        let user = repo
            .find_user(token_data.claims.sub)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::unauthorized("the authenticated user no longer exists"))?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
