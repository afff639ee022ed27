//! Role-based access policy
//!
//! Pure function of (account, requested server, action) to an effective
//! [`Scope`]. It is called before every multi-row read and every issuance;
//! it holds no state and performs no I/O.
//!
//! | Role   | Query, no server | Query, server S      | Issue S              |
//! |--------|------------------|----------------------|----------------------|
//! | Admin  | all servers      | S                    | S (server required)  |
//! | Owner  | bound server     | S if S == bound      | S if S == bound      |
//! | Player | own rows         | own rows (S ignored) | denied               |

use crate::{
    error::{Error, Result},
    types::{Account, Action, Role, Scope, ServerId},
};

/// Resolve the scope `account` may touch for `action`
pub fn authorize(
    account: &Account,
    requested_server: Option<&ServerId>,
    action: Action,
) -> Result<Scope> {
    match &account.role {
        Role::Admin => match (requested_server, action) {
            (Some(server), _) => Ok(Scope::Server(server.clone())),
            (None, Action::Query) => Ok(Scope::AllServers),
            (None, Action::Issue) => Err(Error::Validation(
                "issuance requires an explicit target server".to_string(),
            )),
        },

        Role::Owner => {
            let bound = account.server_id.as_ref().ok_or_else(|| {
                Error::Forbidden("owner account has no bound server".to_string())
            })?;
            match requested_server {
                None => Ok(Scope::Server(bound.clone())),
                Some(server) if server == bound => Ok(Scope::Server(bound.clone())),
                Some(_) => Err(Error::Forbidden(
                    "not authorized for this server".to_string(),
                )),
            }
        }

        Role::Player => match action {
            Action::Issue => Err(Error::Forbidden(
                "players cannot issue currency".to_string(),
            )),
            Action::Query => account
                .player_id
                .clone()
                .map(Scope::Player)
                .ok_or_else(|| Error::Forbidden("no linked player identity".to_string())),
        },

        Role::Unrecognized(_) => Err(Error::Forbidden("invalid role".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerId;

    fn server(id: &str) -> ServerId {
        ServerId::parse(id).unwrap()
    }

    fn admin() -> Account {
        Account::new("admin", "hash", Role::Admin, None, None).unwrap()
    }

    fn owner(bound: &str) -> Account {
        Account::new("owner", "hash", Role::Owner, Some(server(bound)), None).unwrap()
    }

    fn player(linked: Option<&str>) -> Account {
        Account::new(
            "player",
            "hash",
            Role::Player,
            None,
            linked.map(|p| PlayerId::parse(p).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_admin_scopes() {
        let admin = admin();
        assert_eq!(
            authorize(&admin, None, Action::Query).unwrap(),
            Scope::AllServers
        );
        assert_eq!(
            authorize(&admin, Some(&server("S1")), Action::Query).unwrap(),
            Scope::Server(server("S1"))
        );
        assert_eq!(
            authorize(&admin, Some(&server("S2")), Action::Issue).unwrap(),
            Scope::Server(server("S2"))
        );
    }

    #[test]
    fn test_admin_issue_needs_server() {
        let err = authorize(&admin(), None, Action::Issue).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_owner_confined_to_bound_server() {
        let owner = owner("S1");
        assert_eq!(
            authorize(&owner, None, Action::Query).unwrap(),
            Scope::Server(server("S1"))
        );
        assert_eq!(
            authorize(&owner, Some(&server("S1")), Action::Issue).unwrap(),
            Scope::Server(server("S1"))
        );

        for action in [Action::Query, Action::Issue] {
            let err = authorize(&owner, Some(&server("S2")), action).unwrap_err();
            assert!(err.to_string().contains("not authorized for this server"));
        }
    }

    #[test]
    fn test_owner_without_binding_denied() {
        // Bypass the constructor the way a corrupt record would
        let mut owner = owner("S1");
        owner.server_id = None;
        let err = authorize(&owner, None, Action::Query).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_player_scope_ignores_server() {
        let player = player(Some("steve"));
        let expected = Scope::Player(PlayerId::parse("steve").unwrap());
        assert_eq!(authorize(&player, None, Action::Query).unwrap(), expected);
        assert_eq!(
            authorize(&player, Some(&server("S9")), Action::Query).unwrap(),
            expected
        );
    }

    #[test]
    fn test_player_cannot_issue() {
        let err = authorize(&player(Some("steve")), Some(&server("S1")), Action::Issue)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_unlinked_player_denied() {
        let err = authorize(&player(None), None, Action::Query).unwrap_err();
        assert!(err.to_string().contains("no linked player identity"));
    }

    #[test]
    fn test_unknown_role_denied() {
        let mut account = admin();
        account.role = Role::from("superuser");
        for action in [Action::Query, Action::Issue] {
            let err = authorize(&account, Some(&server("S1")), action).unwrap_err();
            assert!(err.to_string().contains("invalid role"));
        }
    }
}
