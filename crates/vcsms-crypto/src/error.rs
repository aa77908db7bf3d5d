/// Errors produced by the cryptographic façade.
///
/// Decryption failures are split so callers can distinguish a MAC mismatch
/// (tampering or the wrong key) from a structural problem with the
/// ciphertext itself (truncated block, bad padding).
#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("mac verification failed")]
    MacMismatch,
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),
    #[error("padding error: {0}")]
    Padding(String),
    #[error("signature verification failed")]
    BadSignature,
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
