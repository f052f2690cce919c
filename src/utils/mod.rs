pub mod pkce;
pub mod secret;
pub mod url;
