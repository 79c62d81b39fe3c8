//! Central identity and session management for the dictionary server.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod resolver;
mod gate;

pub use principal::{Principal, Role};
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{AuthError, LocalAuthProvider, LoginRequest, RegisterRequest, LoginResponse};
pub use resolver::{ResolvedUser, resolve};
pub use gate::{require_role, guard};
