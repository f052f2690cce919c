use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Bcrypt cost factor for hashing client secrets
pub const BCRYPT_COST: u32 = 12;

/// Length of generated opaque tokens (256 bits of entropy)
pub const TOKEN_LENGTH: usize = 43;

/// Character set for opaque tokens (URL-safe base64 characters)
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generate an opaque token suitable for challenge ids, verifiers,
/// request ids, authorization codes, and access/refresh tokens.
///
/// URL-safe so the value can travel in query strings and cookies without
/// further encoding.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();

    (0..TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// SHA-256 hash of a token, base64url-encoded, as stored at rest.
///
/// Tokens are high-entropy random values, so an unsalted fast hash is
/// enough and keeps lookups a single indexed query.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Hash a client secret with bcrypt for storage.
pub fn hash_secret(secret: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(secret, BCRYPT_COST)
}

/// Verify a client secret against its stored bcrypt hash.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    bcrypt::verify(secret, hash).unwrap_or(false)
}
