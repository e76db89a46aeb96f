use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::Error;
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole, ttl_hours: i64) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::unauthorized(
                "You don't have permission to perform this action",
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

pub fn generate_jwt_session(user: &User, secret: &[u8], ttl_hours: i64) -> Result<String, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| Error::internal("Invalid session signing key"))?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        ttl_hours,
    );

    claims
        .sign_with_key(&key)
        .map_err(|_| Error::internal("Failed to sign session token"))
}

pub fn verify_jwt_session(token: String, secret: &[u8]) -> Result<JwtSessionData, Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| Error::internal("Invalid session signing key"))?;

    token
        .verify_with_key(&key)
        .map_err(|_| Error::invalid_session("Invalid session; Invalid token"))
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(Error::invalid_session("Invalid session; Token expired"));
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user() -> User {
        User {
            id: 7,
            username: String::from("alice"),
            email: String::from("alice@example.com"),
            first_name: None,
            last_name: None,
            password: String::from("$argon2id$stub"),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let token = generate_jwt_session(&user(), SECRET, 24).unwrap();
        let session = verify_jwt_session(token, SECRET).unwrap();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(), SECRET, 24).unwrap();
        assert!(verify_jwt_session(token, b"other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(&user(), SECRET, -1).unwrap();
        assert!(verify_jwt_session(token, SECRET).is_err());
    }

    #[test]
    fn session_data_carries_admin_flag() {
        let mut u = user();
        u.role = UserRole::Admin;
        let token = generate_jwt_session(&u, SECRET, 1).unwrap();
        let session = SessionData::from(verify_jwt_session(token, SECRET).unwrap());
        assert!(session.is_admin);
    }
}
