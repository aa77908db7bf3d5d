//! AES-256-CBC encryption with random padding and an HMAC-SHA256 tag.
//!
//! Grounded on `vcsms/cryptography/aes256.py`'s contract (random front/back
//! padding around the plaintext before the cipher's own PKCS7 padding, IV
//! supplied by the caller, MAC appended so tampering is detected before any
//! plaintext is trusted) and `rift-crypto/src/connection.rs`'s
//! `PacketCipher` for the wrap-a-cipher-in-one-type shape.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
/// Random bytes prepended and appended to the plaintext before framing, so
/// two encryptions of the same message don't share a ciphertext prefix even
/// when the IV collides.
const RANDOM_PAD_LEN: usize = 8;

/// A 256-bit session key and the MAC key derived from it.
#[derive(Clone)]
pub struct SessionKey {
    cipher_key: [u8; 32],
    mac_key: [u8; 32],
}

impl SessionKey {
    /// Derive a session key from a shared secret's big-endian byte
    /// representation, as produced by `dhke::shared_secret(..).to_bytes_be()`.
    pub fn from_shared_secret(shared: &[u8]) -> Self {
        let cipher_key = crate::hash::hash(shared);
        let mac_key = crate::hash::hash(&cipher_key);
        Self { cipher_key, mac_key }
    }

    pub fn from_raw(cipher_key: [u8; 32]) -> Self {
        let mac_key = crate::hash::hash(&cipher_key);
        Self { cipher_key, mac_key }
    }
}

fn mac(mac_key: &[u8; 32], iv: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("hmac accepts any key length");
    mac.update(iv);
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

/// Encrypt `plaintext` under `key` with a fresh random IV. Returns
/// `(iv, ciphertext || mac)`.
pub fn encrypt(plaintext: &[u8], key: &SessionKey) -> ([u8; IV_LEN], Vec<u8>) {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut padded = Vec::with_capacity(plaintext.len() + 2 * RANDOM_PAD_LEN);
    let mut front = [0u8; RANDOM_PAD_LEN];
    let mut back = [0u8; RANDOM_PAD_LEN];
    rand::thread_rng().fill_bytes(&mut front);
    rand::thread_rng().fill_bytes(&mut back);
    padded.extend_from_slice(&front);
    padded.extend_from_slice(plaintext);
    padded.extend_from_slice(&back);

    let ciphertext = Aes256CbcEnc::new(&key.cipher_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(&padded);

    let tag = mac(&key.mac_key, &iv, &ciphertext);
    let mut out = ciphertext;
    out.extend_from_slice(&tag);
    (iv, out)
}

/// Decrypt `ciphertext_with_mac` (as produced by [`encrypt`]) under `key`.
/// Verifies the MAC before touching the cipher so a tampered frame never
/// reaches the block cipher.
pub fn decrypt(
    iv: &[u8],
    ciphertext_with_mac: &[u8],
    key: &SessionKey,
) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::MalformedCiphertext(format!(
            "expected a {IV_LEN}-byte iv, got {}",
            iv.len()
        )));
    }
    if ciphertext_with_mac.len() < MAC_LEN {
        return Err(CryptoError::MalformedCiphertext(
            "ciphertext shorter than mac tag".into(),
        ));
    }
    let split = ciphertext_with_mac.len() - MAC_LEN;
    let (ciphertext, tag) = ciphertext_with_mac.split_at(split);

    let expected = mac(&key.mac_key, iv, ciphertext);
    if !vcsms_common::constant_time_eq(&expected, tag) {
        return Err(CryptoError::MacMismatch);
    }

    let mut buf = ciphertext.to_vec();
    let padded = Aes256CbcDec::new(&key.cipher_key.into(), iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|err| CryptoError::Padding(err.to_string()))?;

    if padded.len() < 2 * RANDOM_PAD_LEN {
        return Err(CryptoError::MalformedCiphertext(
            "plaintext shorter than the random padding envelope".into(),
        ));
    }
    let end = padded.len() - RANDOM_PAD_LEN;
    Ok(padded[RANDOM_PAD_LEN..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::from_raw([7u8; 32])
    }

    #[test]
    fn roundtrip() {
        let key = key();
        let (iv, ct) = encrypt(b"hello, relay", &key);
        let pt = decrypt(&iv, &ct, &key).unwrap();
        assert_eq!(pt, b"hello, relay");
    }

    #[test]
    fn empty_message_roundtrips() {
        let key = key();
        let (iv, ct) = encrypt(b"", &key);
        let pt = decrypt(&iv, &ct, &key).unwrap();
        assert_eq!(pt, b"");
    }

    #[test]
    fn tampered_ciphertext_is_rejected_by_mac() {
        let key = key();
        let (iv, mut ct) = encrypt(b"secret message", &key);
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        let err = decrypt(&iv, &ct, &key).unwrap_err();
        assert!(matches!(err, CryptoError::MacMismatch));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = key();
        let other = SessionKey::from_raw([9u8; 32]);
        let (iv, ct) = encrypt(b"secret message", &key);
        assert!(decrypt(&iv, &ct, &other).is_err());
    }
}
