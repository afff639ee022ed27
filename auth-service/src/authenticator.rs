//! Session-token authentication for the web front-end
//!
//! Login verifies an Argon2 credential and hands out an opaque UUIDv4 token
//! that expires after a fixed TTL. Live sessions are cached in a sharded
//! concurrent map keyed by token and mirrored onto the account record, so
//! they survive a restart through [`SessionAuthenticator::restore_sessions`].
//!
//! Expiry is enforced lazily on every [`Authenticator::resolve`]; the
//! optional sweeper only reclaims memory.

use crate::error::{AuthError, Result};
use crate::password::{verify_password, DUMMY_PASSWORD_HASH};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use globalbank_ledger::{Account, AccountStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Default session lifetime (two hours)
pub const DEFAULT_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token
    pub token: String,

    /// Account the token resolves to
    pub account: Account,

    /// Expiry instant
    pub expires_at: DateTime<Utc>,
}

/// Resolves web credentials and tokens to accounts
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify credentials and start a session
    async fn login(&self, username: &str, password: &str) -> Result<Session>;

    /// Account behind a live token
    async fn resolve(&self, token: &str) -> Result<Account>;

    /// End a session
    async fn logout(&self, token: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct CachedSession {
    username: String,
    expires_at: DateTime<Utc>,
}

/// Authenticator backed by an [`AccountStore`] and an in-process token cache
pub struct SessionAuthenticator {
    store: Arc<dyn AccountStore>,
    sessions: DashMap<String, CachedSession>,
    ttl: Duration,
}

impl SessionAuthenticator {
    /// Create an authenticator issuing sessions that live for `ttl`
    pub fn new(store: Arc<dyn AccountStore>, ttl: Duration) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Number of cached sessions, expired ones included until swept
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop every expired session from the cache
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            tracing::debug!(removed, "Swept expired sessions");
        }
        removed
    }

    /// Rebuild the cache from accounts holding an unexpired session
    pub fn restore_sessions(&self) -> Result<usize> {
        let now = Utc::now();
        let mut restored = 0;

        for account in self.store.list_accounts()? {
            if !account.has_live_session(now) {
                continue;
            }
            if let (Some(token), Some(expires_at)) =
                (account.session_token.clone(), account.session_expires_at)
            {
                self.sessions.insert(
                    token,
                    CachedSession {
                        username: account.username,
                        expires_at,
                    },
                );
                restored += 1;
            }
        }

        tracing::info!(restored, "Restored sessions");
        Ok(restored)
    }

    fn load_account(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.store.get_account(username)?)
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let stored = self.load_account(username)?;

        // Unknown users are checked against a dummy hash at the same cost.
        // Keep Argon2 off the async workers.
        let hash = stored
            .as_ref()
            .map(|account| account.password_hash.clone())
            .unwrap_or_else(|| DUMMY_PASSWORD_HASH.to_string());
        let candidate = password.to_string();
        let verified = tokio::task::spawn_blocking(move || verify_password(&hash, &candidate))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let mut account = match stored {
            Some(account) if verified => account,
            Some(_) => {
                tracing::info!(username, "Login failed: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::info!(username, "Login failed: unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // One live session per account
        if let Some(previous) = account.session_token.take() {
            self.sessions.remove(&previous);
        }

        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + self.ttl;
        account.session_token = Some(token.clone());
        account.session_expires_at = Some(expires_at);
        self.store.put_account(&account)?;

        self.sessions.insert(
            token.clone(),
            CachedSession {
                username: account.username.clone(),
                expires_at,
            },
        );

        tracing::info!(
            username = %account.username,
            role = %account.role,
            expires_at = %expires_at,
            "Session started"
        );

        Ok(Session {
            token,
            account,
            expires_at,
        })
    }

    async fn resolve(&self, token: &str) -> Result<Account> {
        let cached = self
            .sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(AuthError::SessionNotFound)?;

        if cached.expires_at <= Utc::now() {
            self.sessions.remove(token);
            tracing::debug!(username = %cached.username, "Session expired");
            return Err(AuthError::SessionNotFound);
        }

        // The stored record is authoritative for role and binding
        match self.load_account(&cached.username)? {
            Some(account) if account.session_token.as_deref() == Some(token) => Ok(account),
            _ => {
                self.sessions.remove(token);
                Err(AuthError::SessionNotFound)
            }
        }
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let (_, cached) = self
            .sessions
            .remove(token)
            .ok_or(AuthError::SessionNotFound)?;

        if let Some(mut account) = self.load_account(&cached.username)? {
            if account.session_token.as_deref() == Some(token) {
                account.session_token = None;
                account.session_expires_at = None;
                self.store.put_account(&account)?;
            }
        }

        tracing::info!(username = %cached.username, "Session ended");
        Ok(())
    }
}

/// Periodically sweep expired sessions until the task is aborted
pub fn spawn_session_sweeper(
    authenticator: Arc<SessionAuthenticator>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            authenticator.sweep_expired();
        }
    })
}
