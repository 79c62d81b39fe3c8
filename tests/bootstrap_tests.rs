//! First-run seeding: a fresh db root gets a usable teacher account and the
//! category catalog, and the seeded teacher passes the gate end to end.

use anyhow::Result;
use tempfile::tempdir;

use kupu::dictionary;
use kupu::identity::{require_role, resolve, LocalAuthProvider, LoginRequest, Role, SessionManager};
use kupu::security;

#[test]
fn fresh_install_seeds_teacher_and_categories() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    security::ensure_default_teacher(root)?;
    dictionary::ensure_default_categories(root)?;

    let kaiako = security::find_by_username(root, "kaiako")?.expect("seeded teacher");
    assert!(kaiako.is_teacher);
    assert!(!dictionary::list_categories(root)?.is_empty());
    Ok(())
}

#[test]
fn seeded_teacher_can_login_and_pass_the_gate() -> Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().to_str().unwrap();
    security::ensure_default_teacher(root)?;
    dictionary::ensure_default_categories(root)?;

    let sm = SessionManager::default();
    let p = LocalAuthProvider::new(root.to_string(), sm.clone());
    let resp = p.login(&LoginRequest { username: "kaiako".into(), password: "kaiako-default".into() })
        .expect("default teacher login");

    let resolved = resolve(root, &sm, Some(&resp.session.token))?;
    let principal = require_role(&resolved, Role::Teacher).expect("teacher gate");

    // and the teacher can actually create a word in a seeded category
    let animals = dictionary::find_category_by_name(root, "animals")?.expect("seeded category");
    let id = dictionary::insert_word(
        root,
        &dictionary::NewWord {
            maori: "kurī".into(),
            english: "dog".into(),
            year_level: 1,
            definition: "A domesticated animal that barks.".into(),
            category_id: animals.id,
        },
        principal.user_id,
        chrono::Utc::now().timestamp_millis(),
    )?;
    assert_eq!(dictionary::find_word(root, id)?.unwrap().created_by, principal.user_id);
    Ok(())
}
