//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode on disk, JSON on the wire)
//! - Exact arithmetic (Decimal for money)
//! - Validation at the boundary (identifiers cannot be constructed invalid)

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest accepted server or player identifier, in bytes
pub const MAX_ID_LEN: usize = 64;

fn validate_id(kind: &str, raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", kind)));
    }
    if raw.trim() != raw {
        return Err(Error::Validation(format!(
            "{} has leading or trailing whitespace",
            kind
        )));
    }
    if raw.len() > MAX_ID_LEN {
        return Err(Error::Validation(format!(
            "{} longer than {} bytes",
            kind, MAX_ID_LEN
        )));
    }
    // NUL separates key parts in storage
    if raw.chars().any(char::is_control) {
        return Err(Error::Validation(format!(
            "{} contains control characters",
            kind
        )));
    }
    Ok(())
}

/// Game server identifier (e.g. "ServerA")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerId(String);

impl ServerId {
    /// Parse and validate a server identifier
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_id("server_id", &raw)?;
        Ok(Self(raw))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServerId {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(raw)
    }
}

impl From<ServerId> for String {
    fn from(id: ServerId) -> Self {
        id.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-game player identifier (e.g. "Steve123")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    /// Parse and validate a player identifier
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_id("player_id", &raw)?;
        Ok(Self(raw))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(raw)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Web account role
///
/// Stored and transmitted as a lower-case string. Strings that match no
/// known role are kept as `Unrecognized` so the access policy can deny them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Full access to every server
    Admin,
    /// Access scoped to one bound server
    Owner,
    /// Access to the player's own rows only
    Player,
    /// Unknown role string
    Unrecognized(String),
}

impl Role {
    /// Role name
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::Player => "player",
            Role::Unrecognized(other) => other,
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "admin" => Role::Admin,
            "owner" => Role::Owner,
            "player" => Role::Player,
            _ => Role::Unrecognized(raw),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::from(raw.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Web front-end account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: Uuid,

    /// Unique login name
    pub username: String,

    /// Argon2 PHC string (never plaintext)
    pub password_hash: String,

    /// Role
    pub role: Role,

    /// Bound server (Owner only)
    pub server_id: Option<ServerId>,

    /// Linked in-game identity (Player accounts)
    pub player_id: Option<PlayerId>,

    /// Active session token
    pub session_token: Option<String>,

    /// Session expiry
    pub session_expires_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create an account without a session.
    ///
    /// A bound server is required for owners and rejected for every other role.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        server_id: Option<ServerId>,
        player_id: Option<PlayerId>,
    ) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(Error::Validation("username must not be empty".to_string()));
        }

        match (&role, &server_id) {
            (Role::Owner, None) => {
                return Err(Error::Validation(
                    "owner accounts require a bound server".to_string(),
                ))
            }
            (Role::Owner, Some(_)) => {}
            (_, Some(_)) => {
                return Err(Error::Validation(format!(
                    "role {} cannot be bound to a server",
                    role
                )))
            }
            (_, None) => {}
        }

        Ok(Self {
            id: Uuid::new_v4(),
            username,
            password_hash: password_hash.into(),
            role,
            server_id,
            player_id,
            session_token: None,
            session_expires_at: None,
        })
    }

    /// Whether the stored session is still valid at `now`
    pub fn has_live_session(&self, now: DateTime<Utc>) -> bool {
        match (&self.session_token, self.session_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }
}

/// One (server, player) balance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID
    pub id: Uuid,

    /// Server the balance lives on
    pub server_id: ServerId,

    /// In-game player
    pub player_id: PlayerId,

    /// Current balance (never negative once committed)
    pub balance: Decimal,

    /// Server-wide issuance, denormalized onto every entry of the server
    pub total_issued: Decimal,

    /// Last mutation
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a fresh entry
    pub fn new(
        server_id: ServerId,
        player_id: PlayerId,
        balance: Decimal,
        total_issued: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            server_id,
            player_id,
            balance,
            total_issued,
            updated_at: Utc::now(),
        }
    }
}

/// Operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Multi-row balance read
    Query,
    /// Change a server's total issuance
    Issue,
}

/// Effective scope granted by the access policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every entry on every server
    AllServers,
    /// Every entry of one server
    Server(ServerId),
    /// Every entry of one player, across servers
    Player(PlayerId),
}

/// Circulating supply versus issuance for one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    /// Server
    pub server_id: ServerId,

    /// Sum of all balances on the server
    pub circulating: Decimal,

    /// Current total issuance
    pub total_issued: Decimal,

    /// Number of entries on the server
    pub entry_count: usize,
}

impl SupplySnapshot {
    /// Circulating supply does not exceed issuance
    pub fn is_consistent(&self) -> bool {
        self.circulating <= self.total_issued
    }

    /// Issuance not yet held by players (negative when over-circulating)
    pub fn headroom(&self) -> Decimal {
        self.total_issued - self.circulating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_validation() {
        assert!(ServerId::parse("ServerA").is_ok());
        assert!(ServerId::parse("").is_err());
        assert!(ServerId::parse("   ").is_err());
        assert!(ServerId::parse(" S1").is_err());
        assert!(PlayerId::parse("steve\t").is_err());
        assert!(PlayerId::parse("Steve 123").is_ok());
        assert!(ServerId::parse("a\0b").is_err());
        assert!(PlayerId::parse("x".repeat(MAX_ID_LEN + 1)).is_err());
        assert!(PlayerId::parse("x".repeat(MAX_ID_LEN)).is_ok());
    }

    #[test]
    fn test_id_deserialization_validates() {
        let ok: ServerId = serde_json::from_str("\"S1\"").unwrap();
        assert_eq!(ok.as_str(), "S1");
        assert!(serde_json::from_str::<ServerId>("\"\"").is_err());
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("owner"), Role::Owner);
        assert_eq!(Role::from("player"), Role::Player);
        assert_eq!(
            Role::from("moderator"),
            Role::Unrecognized("moderator".to_string())
        );

        let json = serde_json::to_string(&Role::Owner).unwrap();
        assert_eq!(json, "\"owner\"");
        let back: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(back.as_str(), "superuser");
    }

    #[test]
    fn test_owner_requires_server() {
        let err = Account::new("owner1", "hash", Role::Owner, None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let server = ServerId::parse("S1").unwrap();
        assert!(Account::new("owner1", "hash", Role::Owner, Some(server.clone()), None).is_ok());
        assert!(Account::new("admin1", "hash", Role::Admin, Some(server), None).is_err());
    }

    #[test]
    fn test_live_session() {
        let mut account = Account::new("p", "hash", Role::Player, None, None).unwrap();
        let now = Utc::now();
        assert!(!account.has_live_session(now));

        account.session_token = Some("token".to_string());
        account.session_expires_at = Some(now + chrono::Duration::hours(2));
        assert!(account.has_live_session(now));
        assert!(!account.has_live_session(now + chrono::Duration::hours(3)));
    }

    #[test]
    fn test_supply_snapshot() {
        let snapshot = SupplySnapshot {
            server_id: ServerId::parse("S1").unwrap(),
            circulating: Decimal::from(100),
            total_issued: Decimal::from(200),
            entry_count: 1,
        };
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.headroom(), Decimal::from(100));
    }
}
