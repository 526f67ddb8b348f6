//! Google OAuth authentication
//!
//! Handles:
//! - Google OAuth flow
//! - Signed cookie sessions
//! - Session middleware and extractors

mod flow;
pub mod keys;
mod middleware;
pub mod provider;
pub mod session;

pub use flow::{CALLBACK_PATH, LOGIN_PATH, LOGOUT_PATH, auth_router, found};
pub use keys::SigningKeySet;
pub use middleware::{CurrentUser, Session, session_layer};
pub use provider::{CallbackParams, ProviderClient};
pub use session::{
    CookieDecodeError, IdentityProfile, SessionCodec, SessionContext, SessionCookie, SessionState,
};
