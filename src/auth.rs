//! Local email/password accounts and bearer sessions.
//!
//! Accounts live in the persisted [`Store`]; sessions are kept in memory and
//! die with the process.

use crate::errors::{AppError, AuthError};
use crate::history::date_key;
use crate::models::{Account, Preferences, Store, Theme, UserProfile};
use crate::state::AppState;
use crate::validation::ValidRegistration;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

const HASH_ROUNDS: u32 = 10_000;
pub const SESSION_COOKIE: &str = "session";

pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    hex::encode(digest)
}

/// A fresh salt and the password hashed with it.
pub struct PasswordDigest {
    salt: String,
    hash: String,
}

impl PasswordDigest {
    pub fn new(password: &str) -> Self {
        let salt = new_token();
        let hash = hash_password(&salt, password);
        Self { salt, hash }
    }

    fn apply(self, account: &mut Account) {
        account.password_salt = self.salt;
        account.password_hash = self.hash;
    }
}

/// A submitted password hashed with the salt of the account it will be checked against.
pub struct Candidate {
    salt: String,
    hash: String,
}

impl Candidate {
    pub fn new(salt: &str, password: &str) -> Self {
        Self {
            salt: salt.to_string(),
            hash: hash_password(salt, password),
        }
    }

    /// A salt that changed since hashing never matches.
    fn matches(&self, account: &Account) -> bool {
        let (a, b) = (self.hash.as_bytes(), account.password_hash.as_bytes());
        self.salt == account.password_salt
            && a.len() == b.len()
            && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

pub async fn digest_off_thread(password: String) -> Result<PasswordDigest, AppError> {
    tokio::task::spawn_blocking(move || PasswordDigest::new(&password))
        .await
        .map_err(AppError::internal)
}

pub async fn candidate_off_thread(salt: String, password: String) -> Result<Candidate, AppError> {
    tokio::task::spawn_blocking(move || Candidate::new(&salt, &password))
        .await
        .map_err(AppError::internal)
}

pub fn salt_for_email(store: &Store, email: &str) -> Option<String> {
    store
        .account_by_email(email)
        .map(|account| account.password_salt.clone())
}

pub fn salt_for_user(store: &Store, user_id: &str) -> Option<String> {
    store
        .accounts
        .get(user_id)
        .map(|account| account.password_salt.clone())
}

pub struct Registered {
    pub user_id: String,
    pub verification_token: String,
}

/// Creates the account, its profile and an empty record for the user's today.
pub fn register(
    store: &mut Store,
    form: ValidRegistration,
    digest: PasswordDigest,
    now: DateTime<Utc>,
) -> Result<Registered, AuthError> {
    if store.email_taken(&form.email, None) {
        return Err(AuthError::EmailInUse);
    }

    let user_id = Uuid::new_v4().to_string();
    let verification_token = new_token();
    let mut account = Account {
        id: user_id.clone(),
        email: form.email.clone(),
        password_salt: String::new(),
        password_hash: String::new(),
        email_verified: false,
        verification_token: Some(verification_token.clone()),
        reset_token: None,
        failed_logins: 0,
        locked_until: None,
    };
    digest.apply(&mut account);
    store.accounts.insert(user_id.clone(), account);

    store.profiles.insert(
        user_id.clone(),
        UserProfile {
            id: user_id.clone(),
            name: form.name,
            surname: form.surname,
            email: form.email,
            country: form.country.code.to_string(),
            timezone: form.country.timezone.to_string(),
            preferences: Preferences {
                goal: form.goal,
                theme: Theme::Light,
            },
        },
    );

    let today = crate::zones::date_in(form.country.timezone, now);
    store.merge_count(&user_id, &date_key(today), 0);

    info!(user_id = %user_id, "registered account");
    Ok(Registered {
        user_id,
        verification_token,
    })
}

pub fn verify_email(store: &mut Store, token: &str) -> Result<String, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let account = store
        .accounts
        .values_mut()
        .find(|account| account.verification_token.as_deref() == Some(token))
        .ok_or(AuthError::InvalidToken)?;
    account.email_verified = true;
    account.verification_token = None;
    info!(user_id = %account.id, "email verified");
    Ok(account.id.clone())
}

pub struct LoginPolicy {
    pub max_failed_logins: u32,
    pub lockout: Duration,
}

/// Counts a password attempt against the account, locking it once the
/// policy's limit of consecutive failures is reached.
fn check_attempt(
    account: &mut Account,
    policy: &LoginPolicy,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    if account.locked_until.is_some_and(|until| until > now) {
        warn!(user_id = %account.id, "attempt rejected, account locked");
        return Err(AuthError::TooManyRequests);
    }

    if !candidate.matches(account) {
        account.failed_logins = account.failed_logins.saturating_add(1);
        if account.failed_logins >= policy.max_failed_logins {
            account.locked_until = Some(now + policy.lockout);
            account.failed_logins = 0;
            warn!(user_id = %account.id, "too many failed attempts, locking");
            return Err(AuthError::TooManyRequests);
        }
        warn!(user_id = %account.id, attempts = account.failed_logins, "wrong password");
        return Err(AuthError::WrongCredentials);
    }

    account.failed_logins = 0;
    account.locked_until = None;
    Ok(())
}

pub fn login(
    store: &mut Store,
    policy: &LoginPolicy,
    email: &str,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let id = store
        .account_by_email(email)
        .map(|account| account.id.clone())
        .ok_or(AuthError::WrongCredentials)?;
    let account = store
        .accounts
        .get_mut(&id)
        .ok_or(AuthError::WrongCredentials)?;

    check_attempt(account, policy, candidate, now)?;

    if !account.email_verified {
        return Err(AuthError::EmailNotVerified);
    }
    Ok(account.id.clone())
}

/// Issues a reset token for a known email; unknown emails get `None`.
pub fn request_password_reset(store: &mut Store, email: &str) -> Option<String> {
    let id = store.account_by_email(email)?.id.clone();
    let account = store.accounts.get_mut(&id)?;
    let token = new_token();
    account.reset_token = Some(token.clone());
    info!(user_id = %account.id, "password reset requested");
    Some(token)
}

pub fn reset_password(
    store: &mut Store,
    token: &str,
    digest: PasswordDigest,
) -> Result<String, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let account = store
        .accounts
        .values_mut()
        .find(|account| account.reset_token.as_deref() == Some(token))
        .ok_or(AuthError::InvalidToken)?;
    digest.apply(account);
    account.reset_token = None;
    account.failed_logins = 0;
    account.locked_until = None;
    info!(user_id = %account.id, "password reset");
    Ok(account.id.clone())
}

/// Confirms the password of a signed-in user; failures count toward the same lockout as logins.
pub fn reauthenticate(
    store: &mut Store,
    policy: &LoginPolicy,
    user_id: &str,
    candidate: &Candidate,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let account = store
        .accounts
        .get_mut(user_id)
        .ok_or(AuthError::WrongCredentials)?;
    check_attempt(account, policy, candidate, now)
}

struct Session {
    user_id: String,
    issued_at: DateTime<Utc>,
}

pub struct Sessions {
    ttl: Duration,
    by_token: HashMap<String, Session>,
}

impl Sessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            by_token: HashMap::new(),
        }
    }

    pub fn issue(&mut self, user_id: &str, now: DateTime<Utc>) -> String {
        self.by_token
            .retain(|_, session| now - session.issued_at < self.ttl);
        let token = new_token();
        self.by_token.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                issued_at: now,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<&str> {
        self.by_token
            .get(token)
            .filter(|session| now - session.issued_at < self.ttl)
            .map(|session| session.user_id.as_str())
    }

    pub fn revoke(&mut self, token: &str) {
        self.by_token.remove(token);
    }

    pub fn revoke_user(&mut self, user_id: &str) {
        self.by_token.retain(|_, session| session.user_id != user_id);
    }
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    if bearer.is_some() {
        return bearer;
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The signed-in user behind a request.
pub struct CurrentUser {
    pub id: String,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(AuthError::NotAuthenticated)?;
        let user_id = {
            let sessions = state.sessions.lock().await;
            sessions
                .resolve(&token, Utc::now())
                .map(str::to_string)
                .ok_or(AuthError::NotAuthenticated)?
        };

        let store = state.store.lock().await;
        if !store.profiles.contains_key(&user_id) {
            return Err(AuthError::NotAuthenticated.into());
        }
        Ok(CurrentUser { id: user_id, token })
    }
}

/// Today's date for the user, in their own timezone.
pub fn today_for(store: &Store, user_id: &str) -> NaiveDate {
    let timezone = store
        .profile(user_id)
        .map(|profile| profile.timezone.as_str())
        .unwrap_or("UTC");
    crate::zones::today_in(timezone)
}
