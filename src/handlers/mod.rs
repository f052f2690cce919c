pub mod admin;
pub mod authorize;
pub mod token;

pub use admin::{grant_consent_handler, show_consent_challenge_handler, verify_handler};
pub use authorize::authorize_handler;
pub use token::token_handler;
