use thiserror::Error;
use crate::tprintln;

use super::session::{Session, SessionManager};
use crate::security;

/// Failures the authenticator can report. Unknown user and wrong password
/// deliberately collapse into one variant so the response does not reveal
/// which half failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("{0}")]
    InvalidInput(String),
    #[error("credential store unavailable: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<AuthError> for crate::error::AppError {
    fn from(err: AuthError) -> Self {
        use crate::error::AppError;
        match err {
            AuthError::InvalidCredentials => AppError::auth("invalid_credentials", "invalid username or password"),
            AuthError::UsernameTaken => AppError::conflict("username_taken", "username already taken"),
            AuthError::InvalidInput(msg) => AppError::user("bad_input".into(), msg),
            AuthError::Store(e) => AppError::io("store_unavailable".into(), e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub is_teacher: bool,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
    pub account_id: i64,
}

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;

fn validate_register(req: &RegisterRequest) -> Result<(), AuthError> {
    let name_len = req.username.chars().count();
    if name_len < USERNAME_MIN || name_len > USERNAME_MAX {
        return Err(AuthError::InvalidInput(format!(
            "username must be {}-{} characters", USERNAME_MIN, USERNAME_MAX
        )));
    }
    if req.username.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidInput("username must not contain whitespace".into()));
    }
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(AuthError::InvalidInput(format!(
            "password must be at least {} characters", PASSWORD_MIN
        )));
    }
    Ok(())
}

/// Authenticator backed by the local parquet credential store. Owns nothing
/// but its configuration; the session manager handle is shared with the
/// server state so issued sessions are visible to the resolver.
pub struct LocalAuthProvider {
    pub db_root: String,
    pub sm: SessionManager,
}

impl LocalAuthProvider {
    pub fn new(db_root: String, sm: SessionManager) -> Self { Self { db_root, sm } }

    /// Verify credentials and establish a session holding the account id.
    pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse, AuthError> {
        if req.username.is_empty() || req.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let Some(account) = security::find_by_username(&self.db_root, &req.username)? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !security::verify_password(&account.password_hash, &req.password) {
            return Err(AuthError::InvalidCredentials);
        }
        let session = self.sm.issue(account.id);
        tprintln!("auth.login user={} sid={}", req.username, session.session_id);
        Ok(LoginResponse { account_id: account.id, session })
    }

    /// Create an account and establish a session, sharing login's
    /// postcondition. The duplicate check and the insert are not one
    /// transaction; a concurrent register of the same name can race.
    pub fn register(&self, req: &RegisterRequest) -> Result<LoginResponse, AuthError> {
        validate_register(req)?;
        if security::find_by_username(&self.db_root, &req.username)?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        let hash = security::hash_password(&req.password)?;
        let id = security::insert_user(&self.db_root, &req.username, &hash, req.is_teacher)?;
        let session = self.sm.issue(id);
        tprintln!("auth.register user={} id={} sid={}", req.username, id, session.session_id);
        Ok(LoginResponse { account_id: id, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provider(root: &str) -> LocalAuthProvider {
        LocalAuthProvider::new(root.to_string(), SessionManager::default())
    }

    #[test]
    fn register_establishes_session() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        let resp = p.register(&RegisterRequest {
            username: "alice".into(), password: "longenough1".into(), is_teacher: false,
        }).unwrap();
        assert_eq!(p.sm.validate(&resp.session.token), Some(resp.account_id));
    }

    #[test]
    fn register_rejects_bad_input() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        let short_name = p.register(&RegisterRequest { username: "ab".into(), password: "longenough1".into(), is_teacher: false });
        assert!(matches!(short_name, Err(AuthError::InvalidInput(_))));
        let spacey = p.register(&RegisterRequest { username: "a b c".into(), password: "longenough1".into(), is_teacher: false });
        assert!(matches!(spacey, Err(AuthError::InvalidInput(_))));
        let short_pw = p.register(&RegisterRequest { username: "alice".into(), password: "short".into(), is_teacher: false });
        assert!(matches!(short_pw, Err(AuthError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_username_is_taken_regardless_of_password() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        p.register(&RegisterRequest { username: "alice".into(), password: "longenough1".into(), is_teacher: false }).unwrap();
        let again = p.register(&RegisterRequest { username: "alice".into(), password: "different-pw-9".into(), is_teacher: true });
        assert!(matches!(again, Err(AuthError::UsernameTaken)));
    }

    #[test]
    fn wrong_password_and_unknown_user_look_identical() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        p.register(&RegisterRequest { username: "alice".into(), password: "longenough1".into(), is_teacher: false }).unwrap();
        let wrong_pw = p.login(&LoginRequest { username: "alice".into(), password: "wrong-password".into() });
        let unknown = p.login(&LoginRequest { username: "mallory".into(), password: "wrong-password".into() });
        assert!(matches!(wrong_pw, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn login_succeeds_with_correct_password() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        let reg = p.register(&RegisterRequest { username: "alice".into(), password: "longenough1".into(), is_teacher: true }).unwrap();
        let resp = p.login(&LoginRequest { username: "alice".into(), password: "longenough1".into() }).unwrap();
        assert_eq!(resp.account_id, reg.account_id);
        assert_eq!(p.sm.validate(&resp.session.token), Some(reg.account_id));
    }

    #[test]
    fn empty_credentials_rejected() {
        let tmp = tempdir().unwrap();
        let p = provider(tmp.path().to_str().unwrap());
        let r = p.login(&LoginRequest { username: "".into(), password: "".into() });
        assert!(matches!(r, Err(AuthError::InvalidCredentials)));
    }
}
