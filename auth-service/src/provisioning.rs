//! Out-of-band account provisioning

use crate::error::Result;
use crate::password::hash_password;
use globalbank_ledger::{Account, AccountStore, Error, PlayerId, Role, ServerId};

/// Create a web account with a hashed password.
///
/// Usernames are unique; a taken name is a [`Error::Conflict`].
pub fn provision_account(
    store: &dyn AccountStore,
    username: &str,
    password: &str,
    role: Role,
    server_id: Option<ServerId>,
    player_id: Option<PlayerId>,
) -> Result<Account> {
    if let Role::Unrecognized(raw) = &role {
        return Err(Error::Validation(format!("unknown role: {}", raw)).into());
    }
    if password.is_empty() {
        return Err(Error::Validation("password must not be empty".to_string()).into());
    }
    if store.get_account(username)?.is_some() {
        return Err(Error::Conflict(format!("username already taken: {}", username)).into());
    }

    let account = Account::new(username, hash_password(password)?, role, server_id, player_id)?;
    store.put_account(&account)?;

    tracing::info!(
        username = %account.username,
        role = %account.role,
        server_id = ?account.server_id.as_ref().map(|s| s.as_str()),
        "Account provisioned"
    );

    Ok(account)
}
