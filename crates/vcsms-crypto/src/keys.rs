//! RSA-style keypairs: generation, fingerprinting, and hex-file persistence.
//!
//! Grounded on `vcsms/keys.py` (`generate_keys`, `write_key`, `load_key`,
//! `fingerprint`), with the shared exponent/modulus pair generalised into
//! distinct `PublicKey`/`PrivateKey` types.

use std::path::Path;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::CryptoError;
use crate::hash::hash_hex;
use crate::primes::generate_prime;

const PUBLIC_EXPONENT: u32 = 65537;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub exponent: BigUint,
    pub modulus: BigUint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateKey {
    pub exponent: BigUint,
    pub modulus: BigUint,
}

impl PublicKey {
    pub fn to_hex_pair(&self) -> (String, String) {
        (hex::encode(self.exponent.to_bytes_be()), hex::encode(self.modulus.to_bytes_be()))
    }

    pub fn from_hex_pair(exponent: &str, modulus: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            exponent: biguint_from_hex(exponent)?,
            modulus: biguint_from_hex(modulus)?,
        })
    }
}

impl PrivateKey {
    pub fn from_hex_pair(exponent: &str, modulus: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            exponent: biguint_from_hex(exponent)?,
            modulus: biguint_from_hex(modulus)?,
        })
    }
}

fn biguint_from_hex(s: &str) -> Result<BigUint, CryptoError> {
    let s = s.trim().strip_prefix("0x").unwrap_or(s.trim());
    BigUint::parse_bytes(s.as_bytes(), 16)
        .ok_or_else(|| CryptoError::MalformedCiphertext(format!("invalid hex integer: {s}")))
}

/// Fingerprint a public key as SHA-256(hex(exponent) ":" hex(modulus)).
pub fn fingerprint(key: &PublicKey) -> String {
    let (e, n) = key.to_hex_pair();
    hash_hex(format!("{e}:{n}").as_bytes())
}

/// Generate a fresh keypair with an `bits`-bit modulus (two `bits/2`-bit
/// primes).
pub fn generate_keypair(bits: u64) -> Result<(PublicKey, PrivateKey), CryptoError> {
    let half = bits / 2;
    loop {
        let p = generate_prime(half);
        let q = generate_prime(half);
        if p == q {
            continue;
        }
        let n = &p * &q;
        let one = BigUint::one();
        let phi = (&p - &one) * (&q - &one);
        let e = BigUint::from(PUBLIC_EXPONENT);
        if phi.gcd(&e) != one {
            continue;
        }
        let d = match mod_inverse(&e, &phi) {
            Some(d) => d,
            None => continue,
        };
        return Ok((
            PublicKey { exponent: e, modulus: n.clone() },
            PrivateKey { exponent: d, modulus: n },
        ));
    }
}

/// Extended-Euclidean modular inverse of `a` modulo `m`.
fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let a = num_bigint::BigInt::from(a.clone());
    let m = num_bigint::BigInt::from(m.clone());
    let ext = a.extended_gcd(&m);
    if ext.gcd != num_bigint::BigInt::one() {
        return None;
    }
    let mut x = ext.x % &m;
    if x < num_bigint::BigInt::zero() {
        x += &m;
    }
    x.to_biguint()
}

pub fn save_public(key: &PublicKey, path: impl AsRef<Path>) -> Result<(), CryptoError> {
    let (e, n) = key.to_hex_pair();
    std::fs::write(path, format!("{e}:{n}"))
        .map_err(|err| CryptoError::KeyGeneration(err.to_string()))
}

pub fn save_private(key: &PrivateKey, path: impl AsRef<Path>) -> Result<(), CryptoError> {
    let e = hex::encode(key.exponent.to_bytes_be());
    let n = hex::encode(key.modulus.to_bytes_be());
    std::fs::write(path, format!("{e}:{n}"))
        .map_err(|err| CryptoError::KeyGeneration(err.to_string()))
}

pub fn load_public(path: impl AsRef<Path>) -> Result<PublicKey, CryptoError> {
    let raw = std::fs::read_to_string(path).map_err(|err| CryptoError::KeyGeneration(err.to_string()))?;
    let (e, n) = split_pair(&raw)?;
    PublicKey::from_hex_pair(e, n)
}

pub fn load_private(path: impl AsRef<Path>) -> Result<PrivateKey, CryptoError> {
    let raw = std::fs::read_to_string(path).map_err(|err| CryptoError::KeyGeneration(err.to_string()))?;
    let (e, n) = split_pair(&raw)?;
    PrivateKey::from_hex_pair(e, n)
}

fn split_pair(raw: &str) -> Result<(&str, &str), CryptoError> {
    raw.trim()
        .split_once(':')
        .ok_or_else(|| CryptoError::MalformedCiphertext("key file missing ':' separator".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_roundtrips_through_hex() {
        let (public, private) = generate_keypair(256).unwrap();
        assert_eq!(public.modulus, private.modulus);
        let (e, n) = public.to_hex_pair();
        let reloaded = PublicKey::from_hex_pair(&e, &n).unwrap();
        assert_eq!(public, reloaded);
    }

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let (public, _) = generate_keypair(256).unwrap();
        let fp = fingerprint(&public);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn file_roundtrip() {
        let (public, private) = generate_keypair(256).unwrap();
        let dir = std::env::temp_dir().join("vcsms-keys-test");
        std::fs::create_dir_all(&dir).unwrap();
        let pub_path = dir.join("id.pub");
        let priv_path = dir.join("id.priv");
        save_public(&public, &pub_path).unwrap();
        save_private(&private, &priv_path).unwrap();
        assert_eq!(load_public(&pub_path).unwrap(), public);
        assert_eq!(load_private(&priv_path).unwrap(), private);
    }
}
