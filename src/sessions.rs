//! Account registration and per-surface session management.
//!
//! Logging in on a surface rotates that surface's session UUID, which
//! immediately invalidates every token previously minted for it. Tokens for
//! the other surface keep working.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notify;
use crate::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for access and refresh tokens.
    pub secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: "change-me".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    pub transactional_password: String,
    pub invitation_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub referral_code: String,
    pub submissions_today: u32,
    pub sets_today: u32,
    pub today_profit: Amount,
    pub total_number_can_play: u32,
    pub balance: Amount,
    pub on_hold: Amount,
    pub commission: Amount,
    pub salary: Amount,
    pub credit_score: Amount,
    pub pack: Option<PackId>,
    pub last_connection: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct Sessions {
    store: Store,
    signer: TokenSigner,
}

impl Sessions {
    pub fn new(store: Store, config: &AuthConfig) -> Self {
        Self {
            store,
            signer: TokenSigner::new(&config.secret),
        }
    }

    /// Register a worker. The invitation code must resolve to either an
    /// existing worker's referral code or an unused one-shot voucher.
    pub fn signup(&self, request: &SignupRequest, now: DateTime<Utc>) -> Result<User, Error> {
        if request.username.trim().is_empty() {
            return Err(Error::validation("username", "this field is required"));
        }
        if request.password.is_empty() {
            return Err(Error::validation("password", "this field is required"));
        }
        if request.transactional_password.chars().count() != 4 {
            return Err(Error::validation(
                "transactional_password",
                "the transactional password must be exactly 4 characters long",
            ));
        }

        let email = request.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::validation("email", "this field is required"));
        }

        let writer = self.store.start_writer()?;

        let referrer = writer.user_by_referral_code(&request.invitation_code)?;
        let voucher = match &referrer {
            Some(_) => None,
            None => {
                let code = writer
                    .invitation_code(&request.invitation_code)?
                    .ok_or_else(|| Error::validation("invitation_code", "invalid invitation code"))?;

                if code.is_used {
                    return Err(Error::validation(
                        "invitation_code",
                        "the invitation code has been used",
                    ));
                }

                Some(code)
            }
        };

        let settings = writer.settings()?;

        let id = writer.next_id("users")?;
        let mut user = User::new(
            id,
            request.username.trim().to_string(),
            email,
            request.phone.trim().to_string(),
            hash_secret(&request.password)?,
            hash_secret(&request.transactional_password)?,
            generate_referral_code(),
            now,
        );
        user.reg_bonus_amount = settings.bonus_when_registering;

        writer.create_user(&user).map_err(|err| match err {
            encore_store::Error::Duplicate(field) => {
                Error::validation(field, format!("a user with this {field} already exists"))
            }
            other => other.into(),
        })?;

        let packs = writer.packs_all()?;
        let mut wallet = Wallet::new(id, now);
        wallet.pack = best_pack_for_balance(&packs, Decimal::ZERO);
        writer.put_wallet(&wallet)?;

        if let Some(referrer) = referrer {
            writer.put_invitation(&Invitation {
                user: id,
                referrer: referrer.id,
                created_at: now,
            })?;
        }

        if let Some(mut voucher) = voucher {
            voucher.is_used = true;
            writer.put_invitation_code(&voucher)?;
        }

        writer.commit()?;

        Ok(user)
    }

    /// Validate credentials and mint a fresh token pair for the surface,
    /// rotating the surface's session id.
    pub fn login(
        &self,
        request: &LoginRequest,
        surf: Surface,
        now: DateTime<Utc>,
    ) -> Result<(TokenPair, User), Error> {
        let writer = self.store.start_writer()?;

        let mut user = match writer.user_by_username(&request.username_or_email)? {
            Some(user) => user,
            None => writer
                .user_by_email(&request.username_or_email.to_lowercase())?
                .ok_or(Error::Auth(AuthError::BadCredentials))?,
        };

        if !verify_secret(&request.password, &user.password_hash) {
            return Err(Error::Auth(AuthError::BadCredentials));
        }

        if !user.is_active {
            return Err(Error::Auth(AuthError::Inactive));
        }

        if surf == Surface::Admin && !user.is_staff {
            return Err(Error::Auth(AuthError::NotStaff));
        }

        let sid = Uuid::new_v4();
        match surf {
            Surface::User => user.session_id_user = Some(sid),
            Surface::Admin => user.session_id_admin = Some(sid),
        }
        writer.put_user(&user)?;

        let settings = writer.settings()?;
        writer.commit()?;

        let pair = self
            .signer
            .issue_pair(user.id, sid, surf, settings.token_validity_period_hours, now)?;

        Ok((pair, user))
    }

    /// Mint a new access token from a refresh token, re-checking the
    /// per-surface session id first.
    pub fn refresh(&self, token: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let claims = self.signer.verify(token)?;

        if claims.kind != TokenKind::Refresh {
            return Err(Error::Auth(AuthError::WrongKind));
        }

        let reader = self.store.reader()?;
        let user = reader
            .user(claims.sub)?
            .ok_or(Error::Auth(AuthError::InvalidSession))?;

        check_session(&user, &claims)?;

        let settings = reader.settings()?;
        let sid = expected_session(&user, claims.surf).ok_or(AuthError::InvalidSession)?;

        let access = self.signer.issue(
            user.id,
            sid,
            claims.surf,
            TokenKind::Access,
            chrono::Duration::hours(settings.token_validity_period_hours as i64),
            now,
        )?;

        Ok(access)
    }

    /// Middleware entry: resolve a bearer token into a live user for the
    /// given surface.
    pub fn authenticate(
        &self,
        token: &str,
        surf: Surface,
        now: DateTime<Utc>,
    ) -> Result<User, Error> {
        let claims = self.signer.verify(token)?;

        if claims.kind != TokenKind::Access {
            return Err(Error::Auth(AuthError::WrongKind));
        }

        if claims.surf != surf {
            return Err(Error::Auth(AuthError::InvalidSession));
        }

        let writer = self.store.start_writer()?;
        let mut user = writer
            .user(claims.sub)?
            .ok_or(Error::Auth(AuthError::InvalidSession))?;

        check_session(&user, &claims)?;

        if !user.is_active {
            return Err(Error::Auth(AuthError::Inactive));
        }

        if surf == Surface::Admin && !user.is_staff {
            return Err(Error::Auth(AuthError::NotStaff));
        }

        if !user.is_staff {
            user.last_connection = Some(now);
            writer.put_user(&user)?;
            writer.commit()?;
        }

        Ok(user)
    }

    pub fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), Error> {
        if new.is_empty() {
            return Err(Error::validation("new_password", "this field is required"));
        }

        let writer = self.store.start_writer()?;
        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;

        if !verify_secret(current, &user.password_hash) {
            return Err(Error::validation(
                "current_password",
                "current password is incorrect",
            ));
        }

        user.password_hash = hash_secret(new)?;
        writer.put_user(&user)?;
        writer.commit()?;

        Ok(())
    }

    pub fn change_transactional_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), Error> {
        if new.chars().count() != 4 {
            return Err(Error::validation(
                "new_password",
                "the transactional password must be exactly 4 characters long",
            ));
        }

        let writer = self.store.start_writer()?;
        let mut user = writer.user(user_id)?.ok_or(Error::NotFound("user"))?;

        if !verify_secret(current, &user.transactional_password_hash) {
            return Err(Error::validation(
                "current_password",
                "current transactional password is incorrect",
            ));
        }

        user.transactional_password_hash = hash_secret(new)?;
        writer.put_user(&user)?;
        writer.commit()?;

        Ok(())
    }

    /// Mint a one-shot invitation voucher (admin surface).
    pub fn generate_invitation_code(
        &self,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<InvitationCode, Error> {
        let writer = self.store.start_writer()?;

        let code = loop {
            let candidate = generate_referral_code();
            if writer.invitation_code(&candidate)?.is_none() {
                break candidate;
            }
        };

        let voucher = InvitationCode {
            code,
            is_used: false,
            created_at: now,
        };
        writer.put_invitation_code(&voucher)?;

        notify::admin_log(&writer, Some(actor), "Generated an invitation code", now);

        writer.commit()?;

        Ok(voucher)
    }

    /// Profile payload for the authenticated worker.
    pub fn profile(&self, user_id: UserId) -> Result<ProfileView, Error> {
        let reader = self.store.reader()?;

        let user = reader.user(user_id)?.ok_or(Error::NotFound("user"))?;
        let wallet = reader
            .wallet(user_id)?
            .unwrap_or_else(|| Wallet::new(user_id, user.created_at));

        let daily_missions = match wallet.pack {
            Some(id) => reader.pack(id)?.map(|p| p.daily_missions).unwrap_or(0),
            None => 0,
        };

        Ok(ProfileView {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            referral_code: user.referral_code,
            submissions_today: user.submissions_today,
            sets_today: user.sets_today,
            today_profit: user.today_profit,
            total_number_can_play: daily_missions,
            balance: wallet.balance,
            on_hold: wallet.on_hold,
            commission: wallet.commission,
            salary: wallet.salary,
            credit_score: wallet.credit_score,
            pack: wallet.pack,
            last_connection: user.last_connection,
        })
    }
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;

fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();

    (0..CODE_LEN)
        .map(|_| *CODE_ALPHABET.choose(&mut rng).expect("non-empty alphabet") as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_use_the_unambiguous_alphabet() {
        for _ in 0..16 {
            let code = generate_referral_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }
}
