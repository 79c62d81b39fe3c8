use super::principal::{Principal, Role};
use super::resolver::ResolvedUser;
use crate::error::AppError;

/// Explicit capability check called at the top of protected operations.
/// Anonymous requests are rejected before the role is even considered.
pub fn require_role(user: &ResolvedUser, required: Role) -> Result<&Principal, AppError> {
    let Some(p) = user.principal() else {
        return Err(AppError::auth("not_authenticated", "you are not logged in"));
    };
    if !p.role.satisfies(required) {
        return Err(AppError::forbidden("insufficient_role", "this action requires a teacher account"));
    }
    Ok(p)
}

/// Run `handler` exactly once if the resolved user meets the required role,
/// otherwise return the rejection without invoking it. Stateless: nothing is
/// retained between invocations.
pub fn guard<F, T>(user: &ResolvedUser, required: Role, handler: F) -> Result<T, AppError>
where
    F: FnOnce(&Principal) -> T,
{
    let p = require_role(user, required)?;
    Ok(handler(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher() -> ResolvedUser {
        ResolvedUser::Authenticated(Principal { user_id: 1, username: "kaiako".into(), role: Role::Teacher })
    }

    fn student() -> ResolvedUser {
        ResolvedUser::Authenticated(Principal { user_id: 2, username: "alice".into(), role: Role::Student })
    }

    #[test]
    fn anonymous_never_reaches_handler() {
        let mut calls = 0;
        let r = guard(&ResolvedUser::Anonymous, Role::Teacher, |_| { calls += 1; });
        let err = r.unwrap_err();
        assert_eq!(err.code_str(), "not_authenticated");
        assert_eq!(err.http_status(), 401);
        assert_eq!(calls, 0);
    }

    #[test]
    fn student_rejected_from_teacher_gate() {
        let mut calls = 0;
        let r = guard(&student(), Role::Teacher, |_| { calls += 1; });
        let err = r.unwrap_err();
        assert_eq!(err.code_str(), "insufficient_role");
        assert_eq!(err.http_status(), 403);
        assert_eq!(calls, 0);
    }

    #[test]
    fn teacher_passes_and_handler_runs_once() {
        let mut calls = 0;
        let r = guard(&teacher(), Role::Teacher, |p| { calls += 1; p.user_id });
        assert_eq!(r.unwrap(), 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn student_gate_admits_both_roles() {
        assert!(require_role(&student(), Role::Student).is_ok());
        assert!(require_role(&teacher(), Role::Student).is_ok());
        assert!(require_role(&ResolvedUser::Anonymous, Role::Student).is_err());
    }

    #[test]
    fn handler_result_passes_through_unchanged() {
        let r = guard(&teacher(), Role::Student, |p| format!("hello {}", p.username));
        assert_eq!(r.unwrap(), "hello kaiako");
    }
}
