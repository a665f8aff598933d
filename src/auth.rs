// src/auth.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::db::{self, keys, KeyValueStore};
use crate::rest::Clock;

const UID_LEN: usize = 28;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Email already in use: {0}")]
    EmailInUse(String),
    #[error("This is a sensitive action. Please log out and log back in first.")]
    RequiresRecentLogin,
    #[error("Not logged in. Use 'login' or 'signup' first.")]
    NotLoggedIn,
    #[error("Account storage failed: {0}")]
    Store(#[from] db::Error),
}

/// Stable identifier of a user; namespaces every stored key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

pub type AuthCallback = Box<dyn Fn(Option<&UserId>)>;

/// The authentication collaborator. The rest of the crate only needs the `UserId` it yields.
pub trait AuthProvider {
    fn current_user(&self) -> Option<UserId>;
    /// Registers a callback fired after every login, logout and account deletion.
    fn on_auth_state_change(&mut self, callback: AuthCallback);
    fn sign_up(&mut self, credentials: &Credentials) -> Result<UserId, Error>;
    fn login(&mut self, credentials: &Credentials) -> Result<UserId, Error>;
    fn logout(&mut self) -> Result<(), Error>;
    /// Deletes the signed-in account and signs out. Requires a recent login.
    fn delete_account(&mut self) -> Result<UserId, Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Account {
    uid: UserId,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct SignedIn {
    uid: UserId,
    email: String,
    logged_in_at: DateTime<Utc>,
}

fn hash_password(uid: &UserId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn derive_uid(email: &str, now: DateTime<Utc>) -> UserId {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(UID_LEN);
    UserId(hex)
}

/// Account book kept in a key-value store, with the signed-in user remembered across runs.
pub struct LocalAuth<S: KeyValueStore> {
    store: S,
    clock: Box<dyn Clock>,
    recent_login_window: Duration,
    listeners: Vec<AuthCallback>,
}

impl<S: KeyValueStore> LocalAuth<S> {
    pub fn new(store: S, clock: Box<dyn Clock>, recent_login_window: Duration) -> Self {
        Self {
            store,
            clock,
            recent_login_window,
            listeners: Vec::new(),
        }
    }

    fn accounts(&self) -> Result<BTreeMap<String, Account>, Error> {
        Ok(db::get_json(&self.store, keys::ACCOUNTS)?.unwrap_or_default())
    }

    fn signed_in(&self) -> Option<SignedIn> {
        match db::get_json::<SignedIn>(&self.store, keys::AUTH_SESSION) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Ignoring unreadable auth session: {}", e);
                None
            }
        }
    }

    fn notify(&self, user: Option<&UserId>) {
        for listener in &self.listeners {
            listener(user);
        }
    }

    fn start_session(&mut self, uid: &UserId, email: String) -> Result<(), Error> {
        let session = SignedIn {
            uid: uid.clone(),
            email,
            logged_in_at: self.clock.now(),
        };
        let (key, value) = db::to_json(keys::AUTH_SESSION, &session)?;
        self.store.set(&key, &value)?;
        Ok(())
    }
}

impl<S: KeyValueStore> AuthProvider for LocalAuth<S> {
    fn current_user(&self) -> Option<UserId> {
        self.signed_in().map(|s| s.uid)
    }

    fn on_auth_state_change(&mut self, callback: AuthCallback) {
        self.listeners.push(callback);
    }

    fn sign_up(&mut self, credentials: &Credentials) -> Result<UserId, Error> {
        let email = credentials.normalized_email();
        let mut accounts = self.accounts()?;
        if accounts.contains_key(&email) {
            return Err(Error::EmailInUse(email));
        }
        let now = self.clock.now();
        let uid = derive_uid(&email, now);
        let account = Account {
            password_hash: hash_password(&uid, &credentials.password),
            uid: uid.clone(),
            created_at: now,
        };
        accounts.insert(email.clone(), account);
        let (key, value) = db::to_json(keys::ACCOUNTS, &accounts)?;
        self.store.set(&key, &value)?;
        self.start_session(&uid, email)?;
        tracing::info!(user = uid.as_str(), "Account created");
        self.notify(Some(&uid));
        Ok(uid)
    }

    fn login(&mut self, credentials: &Credentials) -> Result<UserId, Error> {
        let email = credentials.normalized_email();
        let accounts = self.accounts()?;
        let account = accounts.get(&email).ok_or(Error::InvalidCredentials)?;
        if hash_password(&account.uid, &credentials.password) != account.password_hash {
            return Err(Error::InvalidCredentials);
        }
        let uid = account.uid.clone();
        self.start_session(&uid, email)?;
        tracing::info!(user = uid.as_str(), "Logged in");
        self.notify(Some(&uid));
        Ok(uid)
    }

    fn logout(&mut self) -> Result<(), Error> {
        self.store.remove(keys::AUTH_SESSION)?;
        self.notify(None);
        Ok(())
    }

    fn delete_account(&mut self) -> Result<UserId, Error> {
        let session = self.signed_in().ok_or(Error::NotLoggedIn)?;
        if self.clock.now() - session.logged_in_at > self.recent_login_window {
            return Err(Error::RequiresRecentLogin);
        }
        let mut accounts = self.accounts()?;
        accounts.remove(&session.email);
        let (key, value) = db::to_json(keys::ACCOUNTS, &accounts)?;
        self.store.set(&key, &value)?;
        self.store.remove(keys::AUTH_SESSION)?;
        tracing::info!(user = session.uid.as_str(), "Account deleted");
        self.notify(None);
        Ok(session.uid)
    }
}
