//! Proof Key for Code Exchange (RFC 7636, S256).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const CHALLENGE_METHOD: &str = "s256";

/// A verifier kept on this device and the challenge sent with the sign-in request.
#[derive(Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Fresh verifier with 244 random bits, encoded as 43 URL-safe characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut entropy = [0u8; 32];
        entropy[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        entropy[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        let verifier = URL_SAFE_NO_PAD.encode(entropy);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
