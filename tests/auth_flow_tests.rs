//! Authentication and role-gate integration tests: register/login, session
//! resolution, and the teacher gate. These exercise positive and negative
//! paths across the identity modules against a real on-disk store.

use anyhow::Result;
use tempfile::tempdir;

use kupu::identity::{
    guard, resolve, AuthError, LocalAuthProvider, LoginRequest, RegisterRequest, ResolvedUser,
    Role, SessionManager,
};
use kupu::security;

fn provider(root: &str, sm: &SessionManager) -> LocalAuthProvider {
    LocalAuthProvider::new(root.to_string(), sm.clone())
}

fn register_req(username: &str, password: &str, is_teacher: bool) -> RegisterRequest {
    RegisterRequest { username: username.into(), password: password.into(), is_teacher }
}

fn login_req(username: &str, password: &str) -> LoginRequest {
    LoginRequest { username: username.into(), password: password.into() }
}

#[test]
fn full_scenario_register_fail_login_resolve() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    // register("alice","longenough1",Standard) -> success
    let reg = p.register(&register_req("alice", "longenough1", false)).expect("register");

    // authenticate("alice","wrong") -> InvalidCredentials
    let bad = p.login(&login_req("alice", "wrong"));
    assert!(matches!(bad, Err(AuthError::InvalidCredentials)));

    // the failed login must not have touched the registration session
    let still = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(still.principal().unwrap().user_id, reg.account_id);

    // authenticate("alice","longenough1") -> success; resolve -> Authenticated{alice, Student}
    let ok = p.login(&login_req("alice", "longenough1")).expect("login");
    let resolved = resolve(root, &sm, Some(&ok.session.token))?;
    let principal = resolved.principal().expect("authenticated");
    assert_eq!(principal.username, "alice");
    assert_eq!(principal.role, Role::Student);
    assert_eq!(principal.user_id, reg.account_id);
    Ok(())
}

#[test]
fn registration_resolves_with_requested_role() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    let student = p.register(&register_req("alice", "longenough1", false)).unwrap();
    let teacher = p.register(&register_req("whaea-rose", "longenough1", true)).unwrap();

    let r1 = resolve(root, &sm, Some(&student.session.token))?;
    assert_eq!(r1.principal().unwrap().role, Role::Student);
    let r2 = resolve(root, &sm, Some(&teacher.session.token))?;
    assert_eq!(r2.principal().unwrap().role, Role::Teacher);
    Ok(())
}

#[test]
fn duplicate_registration_fails_regardless_of_password() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    p.register(&register_req("alice", "longenough1", false)).unwrap();
    let again = p.register(&register_req("alice", "another-pw-99", true));
    assert!(matches!(again, Err(AuthError::UsernameTaken)));
    Ok(())
}

#[test]
fn role_flip_in_store_is_live_on_next_resolve() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    let reg = p.register(&register_req("alice", "longenough1", false)).unwrap();
    let before = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(before.principal().unwrap().role, Role::Student);

    // promote directly in the store, no re-authentication
    security::set_role(root, reg.account_id, true)?;
    let after = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(after.principal().unwrap().role, Role::Teacher);

    // and back again
    security::set_role(root, reg.account_id, false)?;
    let reverted = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(reverted.principal().unwrap().role, Role::Student);
    Ok(())
}

#[test]
fn deleted_account_fails_open_to_anonymous() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    let reg = p.register(&register_req("alice", "longenough1", true)).unwrap();
    security::delete_user(root, reg.account_id)?;
    let resolved = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(resolved, ResolvedUser::Anonymous);
    Ok(())
}

#[test]
fn teacher_gate_admits_only_teachers() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    let student = p.register(&register_req("alice", "longenough1", false)).unwrap();
    let teacher = p.register(&register_req("whaea-rose", "longenough1", true)).unwrap();

    let mut calls = 0;

    let anon = guard(&ResolvedUser::Anonymous, Role::Teacher, |_| { calls += 1; });
    assert_eq!(anon.unwrap_err().code_str(), "not_authenticated");

    let as_student = resolve(root, &sm, Some(&student.session.token))?;
    let denied = guard(&as_student, Role::Teacher, |_| { calls += 1; });
    assert_eq!(denied.unwrap_err().code_str(), "insufficient_role");
    assert_eq!(calls, 0);

    let as_teacher = resolve(root, &sm, Some(&teacher.session.token))?;
    guard(&as_teacher, Role::Teacher, |_| { calls += 1; }).expect("teacher admitted");
    assert_eq!(calls, 1);
    Ok(())
}

#[test]
fn logout_then_resolve_is_anonymous() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    let sm = SessionManager::default();
    let p = provider(root, &sm);

    let reg = p.register(&register_req("alice", "longenough1", false)).unwrap();
    assert!(sm.logout(&reg.session.token));
    let resolved = resolve(root, &sm, Some(&reg.session.token))?;
    assert_eq!(resolved, ResolvedUser::Anonymous);
    Ok(())
}
