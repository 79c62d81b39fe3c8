use serde::{Deserialize, Serialize};

/// The two roles the dictionary knows about. A teacher can do everything a
/// student can; there is no finer-grained permission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Whether an account holding `self` meets the bar set by `required`.
    pub fn satisfies(self, required: Role) -> bool {
        match required {
            Role::Student => true,
            Role::Teacher => self == Role::Teacher,
        }
    }
}

/// The identity attached to one request. Derived fresh from the session and
/// the credential store each time; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}
