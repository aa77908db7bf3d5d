//! RSA-style sign/verify over a SHA-256 digest of the message.
//!
//! Grounded on `ankit-chaubey-layer/layer-crypto/src/rsa.rs`'s
//! `BigUint::modpow`-based textbook RSA, combined with `vcsms/server.py`'s
//! sign-the-hash contract for its signed DH exchange (spec §4.3's
//! `sign`/`verify`). The digest is salted with random bytes before signing
//! so two signatures over the same message differ, mirroring the
//! original's signed-DH usage where the same public exponent is reused
//! across many handshakes.

use num_bigint::BigUint;
use rand::RngCore;

use crate::dhke::Group;
use crate::hash::hash;
use crate::keys::{PrivateKey, PublicKey};

const SALT_LEN: usize = 16;

fn digest_with_salt(message: &[u8], salt: &[u8]) -> BigUint {
    let mut buf = Vec::with_capacity(message.len() + salt.len());
    buf.extend_from_slice(message);
    buf.extend_from_slice(salt);
    BigUint::from_bytes_be(&hash(&buf))
}

/// Sign `message` with `key`. The signature is `salt || modpow(digest, d, n)`.
pub fn sign(message: &[u8], key: &PrivateKey) -> Vec<u8> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest_with_salt(message, &salt);
    let sig = digest.modpow(&key.exponent, &key.modulus);
    let mut out = Vec::with_capacity(SALT_LEN + sig.to_bytes_be().len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&sig.to_bytes_be());
    out
}

/// Verify `signature` over `message` against `key`.
pub fn verify(message: &[u8], signature: &[u8], key: &PublicKey) -> bool {
    if signature.len() <= SALT_LEN {
        return false;
    }
    let (salt, sig_bytes) = signature.split_at(SALT_LEN);
    let expected = digest_with_salt(message, salt);
    let sig = BigUint::from_bytes_be(sig_bytes);
    sig.modpow(&key.exponent, &key.modulus) == expected
}

/// Sign a Diffie-Hellman public value for transmission, producing the
/// `hex(dh_pub):hex(signature)`-ready pair used by the handshake.
///
/// The signed message is the ASCII hex encoding of `dh_pub` (no `0x`
/// prefix), not its raw big-endian bytes: the peer only ever sees the hex
/// string on the wire, so it must verify over the exact same byte string
/// it can reconstruct, not a re-derived binary form.
pub fn gen_signed_dh(
    private_dh: &BigUint,
    signing_key: &PrivateKey,
    group: &Group,
) -> (BigUint, Vec<u8>) {
    let dh_pub = crate::dhke::public_value(group, private_dh);
    let message = dh_pub.to_str_radix(16);
    let sig = sign(message.as_bytes(), signing_key);
    (dh_pub, sig)
}

pub fn verify_signed_dh(dh_pub: &BigUint, signature: &[u8], signing_key: &PublicKey) -> bool {
    verify(dh_pub.to_str_radix(16).as_bytes(), signature, signing_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn sign_then_verify_succeeds() {
        let (public, private) = generate_keypair(256).unwrap();
        let message = b"the quick brown fox";
        let sig = sign(message, &private);
        assert!(verify(message, &sig, &public));
    }

    #[test]
    fn tampered_message_fails_verify() {
        let (public, private) = generate_keypair(256).unwrap();
        let sig = sign(b"original message", &private);
        assert!(!verify(b"tampered message", &sig, &public));
    }

    #[test]
    fn tampered_signature_fails_verify() {
        let (public, private) = generate_keypair(256).unwrap();
        let mut sig = sign(b"a message", &private);
        let last = sig.len() - 1;
        sig[last] ^= 0xff;
        assert!(!verify(b"a message", &sig, &public));
    }
}
