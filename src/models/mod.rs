pub mod authorization_code;
pub mod client;
pub mod consent;
pub mod consent_challenge;
pub mod footprint;
pub mod login_challenge;
pub mod scopes;
pub mod token;

pub use authorization_code::AuthorizationCode;
pub use client::Client;
pub use consent::Consent;
pub use consent_challenge::ConsentChallenge;
pub use footprint::{Footprint, RequestScope};
pub use login_challenge::{Identity, LoginChallenge};
pub use scopes::Scopes;
pub use token::Token;
