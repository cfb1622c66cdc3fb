use std::collections::HashSet;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::jwt;
use crate::error::AppError;
use crate::state::SharedState;

/// The authenticated actor behind a request: a username plus the role
/// codes carried in the verified token.
#[derive(Debug, Clone)]
pub struct Principal {
    pub username: String,
    pub roles: HashSet<String>,
}

impl Principal {
    pub fn has_role(&self, code: &str) -> bool {
        self.roles.contains(code)
    }

    pub fn is_self(&self, username: &str) -> bool {
        self.username == username
    }
}

impl FromRequestParts<SharedState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;

        let claims = jwt::decode_token(token, &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(Principal {
            username: claims.sub,
            roles: claims.roles.into_iter().collect(),
        })
    }
}
