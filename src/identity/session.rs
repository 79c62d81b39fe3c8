use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use crate::tprintln;

pub type SessionToken = String;

/// One live session. Holds only the account id; username and role are
/// re-read from the credential store on every resolve so a role change or
/// account deletion takes effect on the next request.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub account_id: i64,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    user_index: HashMap<i64, HashSet<String>>,
}

fn gen_id() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-memory session storage. Cloning shares the same underlying maps, so a
/// clone kept in server state and one handed to a provider see each other's
/// sessions. No global state: everything lives behind this handle.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    inner: Arc<RwLock<Inner>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60 * 60), inner: Arc::new(RwLock::new(Inner::default())) }
    }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, inner: Arc::new(RwLock::new(Inner::default())) }
    }

    pub fn issue(&self, account_id: i64) -> Session {
        let now = Instant::now();
        let sid = gen_id();
        let token = gen_id();
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            account_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        {
            let mut m = self.inner.write();
            m.sessions.insert(token.clone(), sess.clone());
            m.user_index.entry(account_id).or_insert_with(HashSet::new).insert(token);
        }
        tprintln!("session.issue account={} sid={} ttl_secs={}", account_id, sid, self.ttl.as_secs());
        sess
    }

    /// Return the account id the token maps to, pruning it if expired.
    pub fn validate(&self, token: &str) -> Option<i64> {
        let now = Instant::now();
        let mut drop_key: Option<(String, i64)> = None;
        let out = {
            let m = self.inner.read();
            if let Some(sess) = m.sessions.get(token) {
                if sess.expires_at > now {
                    Some(sess.account_id)
                } else {
                    drop_key = Some((token.to_string(), sess.account_id));
                    None
                }
            } else { None }
        };
        if let Some((k, uid)) = drop_key {
            let mut m = self.inner.write();
            m.sessions.remove(&k);
            if let Some(set) = m.user_index.get_mut(&uid) { set.remove(&k); }
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let mut m = self.inner.write();
        if let Some(sess) = m.sessions.remove(token) {
            if let Some(set) = m.user_index.get_mut(&sess.account_id) { set.remove(token); }
            true
        } else {
            false
        }
    }

    /// Drop every session for one account, e.g. after an administrative
    /// deactivation. Returns the number of sessions removed.
    pub fn revoke_user(&self, account_id: i64) -> usize {
        let mut count = 0usize;
        let mut m = self.inner.write();
        if let Some(tokens) = m.user_index.remove(&account_id) {
            for t in tokens.iter() {
                if m.sessions.remove(t).is_some() { count += 1; }
            }
        }
        tprintln!("session.revoke account={} count={}", account_id, count);
        count
    }
}
