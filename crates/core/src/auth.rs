use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthError, User, UserId};

/// Which API a token is valid for. A login on one surface rotates that
/// surface's session id only, leaving the other surface's tokens intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub sid: String,
    pub surf: Surface,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub const REFRESH_TTL_DAYS: i64 = 7;

/// HS256 mint/verify of access and refresh tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        user: UserId,
        sid: Uuid,
        surf: Surface,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user,
            sid: sid.to_string(),
            surf,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::Malformed)
    }

    /// Access + refresh pair for a fresh login. Access validity comes from
    /// the site settings; refresh validity is fixed.
    pub fn issue_pair(
        &self,
        user: UserId,
        sid: Uuid,
        surf: Surface,
        access_hours: u64,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let access = self.issue(
            user,
            sid,
            surf,
            TokenKind::Access,
            Duration::hours(access_hours as i64),
            now,
        )?;

        let refresh = self.issue(
            user,
            sid,
            surf,
            TokenKind::Refresh,
            Duration::days(REFRESH_TTL_DAYS),
            now,
        )?;

        Ok(TokenPair { access, refresh })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })
    }
}

/// The session id a token must carry to be accepted on the given surface.
pub fn expected_session(user: &User, surf: Surface) -> Option<Uuid> {
    match surf {
        Surface::User => user.session_id_user,
        Surface::Admin => user.session_id_admin,
    }
}

/// Reject tokens whose `sid` diverges from the per-surface stored value.
pub fn check_session(user: &User, claims: &Claims) -> Result<(), AuthError> {
    let stored = expected_session(user, claims.surf).ok_or(AuthError::InvalidSession)?;

    if stored.to_string() != claims.sid {
        return Err(AuthError::InvalidSession);
    }

    Ok(())
}

pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

pub fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(surf_sid: Uuid) -> User {
        let mut user = User::new(
            7,
            "worker".into(),
            "worker@example.com".into(),
            "+100000000".into(),
            "x".into(),
            "x".into(),
            "REF00001".into(),
            Utc::now(),
        );
        user.session_id_user = Some(surf_sid);
        user
    }

    #[test]
    fn claims_round_trip() {
        let signer = TokenSigner::new("test-secret");
        let sid = Uuid::new_v4();
        let now = Utc::now();

        let token = signer
            .issue(7, sid, Surface::User, TokenKind::Access, Duration::hours(1), now)
            .unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.sid, sid.to_string());
        assert_eq!(claims.surf, Surface::User);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn expired_token_rejected() {
        let signer = TokenSigner::new("test-secret");
        let now = Utc::now() - Duration::hours(3);

        let token = signer
            .issue(
                7,
                Uuid::new_v4(),
                Surface::User,
                TokenKind::Access,
                Duration::hours(1),
                now,
            )
            .unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn tampered_token_rejected() {
        let signer = TokenSigner::new("test-secret");
        let other = TokenSigner::new("other-secret");
        let now = Utc::now();

        let token = other
            .issue(
                7,
                Uuid::new_v4(),
                Surface::User,
                TokenKind::Access,
                Duration::hours(1),
                now,
            )
            .unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::Malformed)));
    }

    #[test]
    fn rotated_session_invalidates_old_claims() {
        let signer = TokenSigner::new("test-secret");
        let old_sid = Uuid::new_v4();
        let now = Utc::now();

        let token = signer
            .issue(7, old_sid, Surface::User, TokenKind::Access, Duration::hours(1), now)
            .unwrap();
        let claims = signer.verify(&token).unwrap();

        let mut user = sample_user(old_sid);
        assert!(check_session(&user, &claims).is_ok());

        user.session_id_user = Some(Uuid::new_v4());
        assert!(matches!(
            check_session(&user, &claims),
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn admin_surface_checks_admin_session() {
        let signer = TokenSigner::new("test-secret");
        let sid = Uuid::new_v4();
        let now = Utc::now();

        let token = signer
            .issue(7, sid, Surface::Admin, TokenKind::Access, Duration::hours(1), now)
            .unwrap();
        let claims = signer.verify(&token).unwrap();

        // user-surface session set, admin-surface not: admin claims rejected
        let user = sample_user(sid);
        assert!(matches!(
            check_session(&user, &claims),
            Err(AuthError::InvalidSession)
        ));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_secret("s3cret!").unwrap();
        assert!(verify_secret("s3cret!", &hash));
        assert!(!verify_secret("other", &hash));
        assert!(!verify_secret("s3cret!", "not-a-phc-string"));
    }
}
