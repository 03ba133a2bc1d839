use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generate a verifier/challenge pair from the thread-local generator.
pub fn generate_pkce() -> PkceChallenge {
    generate_pkce_with(&mut rand::rng())
}

/// Generate a verifier/challenge pair from the given random source.
///
/// 32 random bytes encode to a 43-character base64url verifier, the
/// minimum length RFC 7636 allows.
pub fn generate_pkce_with<R: RngCore + ?Sized>(rng: &mut R) -> PkceChallenge {
    let mut buf = [0u8; 32];
    rng.fill_bytes(&mut buf);
    let code_verifier = URL_SAFE_NO_PAD.encode(buf);
    let code_challenge = code_challenge_s256(&code_verifier);

    PkceChallenge {
        code_verifier,
        code_challenge,
    }
}

pub fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
