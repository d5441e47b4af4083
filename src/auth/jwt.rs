use crate::models::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode};

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
pub mod testing {
    use crate::models::{Claims, TokenType};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub const SECRET: &str = "test-secret";

    pub fn token(user_id: u64, role: u8, employee_id: Option<u64>, token_type: TokenType) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;
        let claims = Claims {
            user_id,
            sub: format!("user{}", user_id),
            role,
            exp: now + 900,
            jti: format!("jti-{}", user_id),
            token_type,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub fn access_token(user_id: u64, role: u8, employee_id: Option<u64>) -> String {
        token(user_id, role, employee_id, TokenType::Access)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{SECRET, access_token};
    use super::*;

    #[test]
    fn verifies_tokens_signed_with_the_same_secret() {
        let claims = verify_token(&access_token(9, 3, Some(100)), SECRET).unwrap();
        assert_eq!(claims.user_id, 9);
        assert_eq!(claims.employee_id, Some(100));

        assert!(verify_token(&access_token(9, 3, None), "other-secret").is_err());
    }
}
