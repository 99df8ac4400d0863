//! Authentication
//!
//! Handles:
//! - Signed session tokens issued by the identity provider
//! - Request extractors (signed-in user, admin user)

mod middleware;
pub mod session;

pub use middleware::{AdminUser, MaybeUser};
pub use session::{Session, create_session_token, verify_session_token};
