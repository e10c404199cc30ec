pub mod oauth;
pub mod token;

pub use oauth::{OAuthConfig, OAuthError};
pub use token::{SESSION_TTL_DAYS, create_session_token, decode_session_token};
