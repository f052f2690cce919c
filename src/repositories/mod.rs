pub mod authorization_code;
pub mod client;
pub mod consent;
pub mod consent_challenge;
pub mod login_challenge;
pub mod memory;
pub mod token;

use std::sync::Arc;

use sqlx::MySqlPool;

pub use authorization_code::{AuthorizationCodeRepository, MySqlAuthorizationCodeRepository};
pub use client::{ClientRepository, MySqlClientRepository};
pub use consent::{ConsentRepository, MySqlConsentRepository};
pub use consent_challenge::{ConsentChallengeRepository, MySqlConsentChallengeRepository};
pub use login_challenge::{LoginChallengeRepository, MySqlLoginChallengeRepository};
pub use token::{MySqlTokenRepository, TokenRepository};

/// Repository handles injected into the services at startup.
///
/// One bundle per backend; services never look repositories up at
/// runtime.
#[derive(Clone)]
pub struct Repositories {
    pub login_challenges: Arc<dyn LoginChallengeRepository>,
    pub consent_challenges: Arc<dyn ConsentChallengeRepository>,
    pub consents: Arc<dyn ConsentRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub authorization_codes: Arc<dyn AuthorizationCodeRepository>,
    pub tokens: Arc<dyn TokenRepository>,
}

impl Repositories {
    /// Production bundle over a shared MySQL pool.
    pub fn mysql(pool: &MySqlPool) -> Self {
        Self {
            login_challenges: Arc::new(MySqlLoginChallengeRepository::new(pool.clone())),
            consent_challenges: Arc::new(MySqlConsentChallengeRepository::new(pool.clone())),
            consents: Arc::new(MySqlConsentRepository::new(pool.clone())),
            clients: Arc::new(MySqlClientRepository::new(pool.clone())),
            authorization_codes: Arc::new(MySqlAuthorizationCodeRepository::new(pool.clone())),
            tokens: Arc::new(MySqlTokenRepository::new(pool.clone())),
        }
    }

    /// In-memory bundle for tests.
    pub fn in_memory() -> Self {
        Self {
            login_challenges: Arc::new(memory::MemoryLoginChallengeRepository::default()),
            consent_challenges: Arc::new(memory::MemoryConsentChallengeRepository::default()),
            consents: Arc::new(memory::MemoryConsentRepository::default()),
            clients: Arc::new(memory::MemoryClientRepository::default()),
            authorization_codes: Arc::new(memory::MemoryAuthorizationCodeRepository::default()),
            tokens: Arc::new(memory::MemoryTokenRepository::default()),
        }
    }
}
