pub mod handlers;
pub mod password;
pub mod session;
pub mod store;

pub use session::SessionUser;
pub use store::{AuthError, AuthEvent, Session, SessionStore};
