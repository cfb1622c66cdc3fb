use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims of a verified bearer token. Issuance belongs to the external
/// identity provider; this service only consumes the decoded claim set.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub roles: Vec<String>,
    pub exp: i64,
}

impl Claims {
    pub fn new(username: String, roles: Vec<String>) -> Self {
        Self {
            sub: username,
            roles,
            exp: (Utc::now() + Duration::minutes(15)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

/// Decode and verify a token. Role codes are case-normalized so policy
/// rules can compare them verbatim.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| {
        let mut claims = data.claims;
        for role in &mut claims.roles {
            *role = role.to_uppercase();
        }
        claims
    })
    .map_err(|e| format!("JWT decode failed: {e}"))
}
