use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use polars::prelude::*;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{SaltString, PasswordHash};

/// A persisted identity record: the credential store's row type.
/// `id` is assigned by the store at insert time and never supplied by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_teacher: bool,
}

fn users_path(db_root: &str) -> PathBuf { Path::new(db_root).join("users.parquet") }

fn mk_schema_df() -> DataFrame {
    let ids: Series = Series::new("id".into(), Vec::<i64>::new());
    let usernames: Series = Series::new("username".into(), Vec::<String>::new());
    let hashes: Series = Series::new("password_hash".into(), Vec::<String>::new());
    let is_teacher: Series = Series::new("is_teacher".into(), Vec::<bool>::new());
    DataFrame::new(vec![ids.into(), usernames.into(), hashes.into(), is_teacher.into()]).unwrap()
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

fn read_users(path: &Path) -> Result<DataFrame> {
    if !path.exists() { return Ok(mk_schema_df()); }
    let file = std::fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(df)
}

fn write_users(path: &Path, mut df: DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
    let mut f = std::fs::File::create(path)?;
    ParquetWriter::new(&mut f).finish(&mut df)?;
    Ok(())
}

fn account_at(df: &DataFrame, i: usize) -> Result<Account> {
    let id = df.column("id")?.i64()?.get(i).ok_or_else(|| anyhow!("users: null id at row {}", i))?;
    let username = match df.column("username")?.get(i)? {
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => return Err(anyhow!("users: unexpected username value {:?}", other)),
    };
    let password_hash = match df.column("password_hash")?.get(i)? {
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => return Err(anyhow!("users: unexpected hash value {:?}", other)),
    };
    let is_teacher = df.column("is_teacher")?.bool()?.get(i).unwrap_or(false);
    Ok(Account { id, username, password_hash, is_teacher })
}

pub fn find_by_username(db_root: &str, username: &str) -> Result<Option<Account>> {
    let df = read_users(&users_path(db_root))?;
    for i in 0..df.height() {
        let matches = match df.column("username")?.get(i)? {
            AnyValue::String(s) => s == username,
            AnyValue::StringOwned(ref s) => s.as_str() == username,
            _ => false,
        };
        if matches { return Ok(Some(account_at(&df, i)?)); }
    }
    Ok(None)
}

pub fn find_by_id(db_root: &str, id: i64) -> Result<Option<Account>> {
    let df = read_users(&users_path(db_root))?;
    for i in 0..df.height() {
        if df.column("id")?.i64()?.get(i) == Some(id) {
            return Ok(Some(account_at(&df, i)?));
        }
    }
    Ok(None)
}

/// Insert a new account and return the id the store assigned to it.
/// Username uniqueness is enforced here; the check and the append are not
/// transactional across concurrent requests.
pub fn insert_user(db_root: &str, username: &str, password_hash: &str, is_teacher: bool) -> Result<i64> {
    let p = users_path(db_root);
    let df = read_users(&p)?;
    let mut max_id: i64 = 0;
    for i in 0..df.height() {
        let taken = match df.column("username")?.get(i)? {
            AnyValue::String(s) => s == username,
            AnyValue::StringOwned(ref s) => s.as_str() == username,
            _ => false,
        };
        if taken { return Err(anyhow!("username already exists: {}", username)); }
        if let Some(id) = df.column("id")?.i64()?.get(i) { max_id = max_id.max(id); }
    }
    let id = max_id + 1;
    let new = DataFrame::new(vec![
        Series::new("id".into(), vec![id]).into(),
        Series::new("username".into(), vec![username.to_string()]).into(),
        Series::new("password_hash".into(), vec![password_hash.to_string()]).into(),
        Series::new("is_teacher".into(), vec![is_teacher]).into(),
    ])?;
    if df.height() == 0 { write_users(&p, new)?; } else { let stacked = df.vstack(&new)?; write_users(&p, stacked)?; }
    Ok(id)
}

fn keep_all_but(df: &DataFrame, id: i64) -> Result<DataFrame> {
    let ids = df.column("id")?.i64()?.clone();
    let mask: ChunkedArray<BooleanType> = ids.iter().map(|v| v != Some(id)).collect();
    Ok(df.filter(&mask)?)
}

/// Administrative role flip. Resolution reads the flag live from the store,
/// so the change is visible on the very next request without re-login.
pub fn set_role(db_root: &str, id: i64, is_teacher: bool) -> Result<()> {
    let p = users_path(db_root);
    let df = read_users(&p)?;
    let Some(acc) = find_row(&df, id)? else { return Err(anyhow!("user not found: {}", id)); };
    let rest = keep_all_but(&df, id)?;
    let updated = DataFrame::new(vec![
        Series::new("id".into(), vec![acc.id]).into(),
        Series::new("username".into(), vec![acc.username]).into(),
        Series::new("password_hash".into(), vec![acc.password_hash]).into(),
        Series::new("is_teacher".into(), vec![is_teacher]).into(),
    ])?;
    if rest.height() == 0 { write_users(&p, updated) } else { let stacked = rest.vstack(&updated)?; write_users(&p, stacked) }
}

pub fn delete_user(db_root: &str, id: i64) -> Result<()> {
    let p = users_path(db_root);
    let df = read_users(&p)?;
    if df.height() == 0 { return Ok(()); }
    let rest = keep_all_but(&df, id)?;
    write_users(&p, rest)
}

fn find_row(df: &DataFrame, id: i64) -> Result<Option<Account>> {
    for i in 0..df.height() {
        if df.column("id")?.i64()?.get(i) == Some(id) {
            return Ok(Some(account_at(df, i)?));
        }
    }
    Ok(None)
}

/// Seed a default teacher account on first run so a fresh install is usable.
pub fn ensure_default_teacher(db_root: &str) -> Result<()> {
    let p = users_path(db_root);
    if p.exists() { return Ok(()); }
    let hash = hash_password("kaiako-default")?;
    insert_user(db_root, "kaiako", &hash, true)?;
    Ok(())
}
