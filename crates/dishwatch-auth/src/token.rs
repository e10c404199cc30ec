use anyhow::Result;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use dishwatch_types::api::Claims;

/// How long a session JWT (and the server-side session it names) lives.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Mint the session JWT handed to the client after a successful OAuth
/// callback. `session_id` keys the server-side session state.
pub fn create_session_token(secret: &str, session_id: Uuid) -> Result<String> {
    let claims = Claims {
        sub: session_id,
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip() {
        let session_id = Uuid::new_v4();
        let token = create_session_token("test-secret", session_id).unwrap();

        let claims = decode_session_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, session_id);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_session_token("secret-a", Uuid::new_v4()).unwrap();
        assert!(decode_session_token("secret-b", &token).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(decode_session_token("test-secret", "not.a.jwt").is_err());
    }
}
