//! Local sign-up and login over a `users` JSON array.
//!
//! Credentials are kept and compared in plaintext, exactly as the app has always stored them.

use crate::storage::{KeyValueStore, StorageError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub const USERS_KEY: &str = "users";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+@([A-Za-z0-9_-]+\.)+[A-Za-z0-9_-]{2,4}$").expect("email regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub newsletter: bool,
}

/// What the app may show about a user; never carries the password.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub username: String,
    pub newsletter: bool,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            newsletter: user.newsletter,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub newsletter: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Please enter an email address.")]
    MissingEmail,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Please enter a password.")]
    MissingPassword,
    #[error("Please enter a valid password.")]
    InvalidPassword,
    #[error("Please enter both an email and a password.")]
    MissingFields,
    #[error("Please try again or sign up!")]
    NoAccounts,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("No account data found.")]
    NoAccountData,
    #[error("users file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AccountError {
    /// Alert title shown above the message.
    pub fn title(&self) -> &'static str {
        match self {
            AccountError::MissingEmail => "Missing Email",
            AccountError::InvalidEmail => "Invalid Email",
            AccountError::MissingPassword => "Missing Password",
            AccountError::InvalidPassword => "Invalid Password",
            AccountError::MissingFields => "Missing Fields",
            AccountError::NoAccounts | AccountError::InvalidCredentials => "Login Failed",
            AccountError::NoAccountData | AccountError::Corrupt(_) | AccountError::Storage(_) => {
                "Error"
            }
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with a digit, a lower-case and an upper-case letter.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && !password.contains('\n')
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

pub fn validate_signup(req: &SignupRequest) -> Result<(), AccountError> {
    if req.email.is_empty() {
        return Err(AccountError::MissingEmail);
    }
    if !is_valid_email(&req.email) {
        return Err(AccountError::InvalidEmail);
    }
    if req.password.is_empty() {
        return Err(AccountError::MissingPassword);
    }
    if !is_valid_password(&req.password) {
        return Err(AccountError::InvalidPassword);
    }
    Ok(())
}

/// Signup and delete rewrite the whole users array; `write_lock` serializes those read-modify-write
/// cycles so concurrent requests never drop each other's records.
#[derive(Clone)]
pub struct AccountStore {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl AccountStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Appends a new user. Existing records with the same email are left in place.
    pub async fn signup(&self, req: SignupRequest) -> Result<UserRecord, AccountError> {
        validate_signup(&req)?;
        let username = req
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();
        let user = UserRecord {
            email: req.email,
            password: req.password,
            username,
            newsletter: req.newsletter,
        };
        let _guard = self.write_lock.lock().await;
        let mut users = self.load().await?.unwrap_or_default();
        users.push(user.clone());
        self.save(&users).await?;
        info!(username = %user.username, "account created");
        Ok(user)
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<UserRecord, AccountError> {
        if req.email.is_empty() || req.password.is_empty() {
            return Err(AccountError::MissingFields);
        }
        let users = self.load().await?.ok_or(AccountError::NoAccounts)?;
        users
            .into_iter()
            .find(|u| u.email == req.email && u.password == req.password)
            .ok_or(AccountError::InvalidCredentials)
    }

    /// Removes every record registered under `email` and returns how many were dropped.
    pub async fn delete(&self, email: &str) -> Result<usize, AccountError> {
        let _guard = self.write_lock.lock().await;
        let users = self.load().await?.ok_or(AccountError::NoAccountData)?;
        let before = users.len();
        let remaining: Vec<UserRecord> = users.into_iter().filter(|u| u.email != email).collect();
        let removed = before - remaining.len();
        self.save(&remaining).await?;
        info!(removed, "account deleted");
        Ok(removed)
    }

    async fn load(&self) -> Result<Option<Vec<UserRecord>>, AccountError> {
        match self.store.get(USERS_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, users: &[UserRecord]) -> Result<(), AccountError> {
        let raw = serde_json::to_string(users)?;
        self.store.set(USERS_KEY, raw).await?;
        Ok(())
    }
}
