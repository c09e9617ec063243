use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
    errors::ErrorKind,
};

use crate::errors::{Error, Result};
use crate::models::user::Role;

pub const ISSUER: &str = "survey-service";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
}

impl Claims {
    pub fn new(id: &str, email: &str, role: Role, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role,
            exp: (now + ttl_secs).max(0) as usize,
            iat: now.max(0) as usize,
            iss: ISSUER.to_string(),
        }
    }
}

pub fn encode_jwt(claim: &Claims, secret: &str) -> Result<String> {
    let token = encode(
        &Header::default(),
        claim,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<TokenData<Claims>> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).map_err(
        |e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::TokenExpired,
            _ => {
                tracing::warn!("Rejected session token: {e}");
                Error::InvalidToken
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let claims = Claims::new("u1", "ada@example.com", Role::Admin, 60);
        let token = encode_jwt(&claims, "s3cret").unwrap();
        let decoded = decode_jwt(&token, "s3cret").unwrap().claims;
        assert_eq!(decoded.id, "u1");
        assert_eq!(decoded.role, Role::Admin);
        assert_eq!(decoded.iss, ISSUER);
    }

    #[test]
    fn rejects_foreign_secret() {
        let token = encode_jwt(&Claims::new("u1", "a@b.io", Role::User, 60), "one").unwrap();
        assert!(matches!(decode_jwt(&token, "two"), Err(Error::InvalidToken)));
    }

    #[test]
    fn reports_expiry() {
        let token = encode_jwt(&Claims::new("u1", "a@b.io", Role::User, -3600), "s").unwrap();
        assert!(matches!(decode_jwt(&token, "s"), Err(Error::TokenExpired)));
    }
}
