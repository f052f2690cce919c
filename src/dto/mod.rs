pub mod admin;
pub mod token;

pub use admin::{
    GrantConsentRequest, GrantConsentResponse, ShowConsentChallengeRequest,
    ShowConsentChallengeResponse, VerifyRequest, VerifyResponse,
};
pub use token::TokenRequest;
