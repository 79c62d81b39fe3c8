use serde::{Deserialize, Serialize};

use super::principal::{Principal, Role};
use super::session::SessionManager;
use crate::security;

/// What the request is acting as, decided once per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedUser {
    Anonymous,
    Authenticated(Principal),
}

impl ResolvedUser {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            ResolvedUser::Anonymous => None,
            ResolvedUser::Authenticated(p) => Some(p),
        }
    }
}

/// Reconstruct the current user from the session token and the credential
/// store. Missing, unknown, or expired tokens resolve to `Anonymous`, as does
/// a session whose account has since been deleted: fail open to anonymous,
/// never to stale privilege. Username and role come from the store on every
/// call, so role edits are visible on the next request. A store read failure
/// is the one condition that propagates instead of resolving.
pub fn resolve(
    db_root: &str,
    sm: &SessionManager,
    token: Option<&str>,
) -> anyhow::Result<ResolvedUser> {
    let Some(token) = token else { return Ok(ResolvedUser::Anonymous) };
    let Some(account_id) = sm.validate(token) else { return Ok(ResolvedUser::Anonymous) };
    let Some(account) = security::find_by_id(db_root, account_id)? else {
        return Ok(ResolvedUser::Anonymous);
    };
    let role = if account.is_teacher { Role::Teacher } else { Role::Student };
    Ok(ResolvedUser::Authenticated(Principal {
        user_id: account.id,
        username: account.username,
        role,
    }))
}
