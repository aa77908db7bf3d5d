//! Diffie-Hellman key exchange over the RFC 3526 MODP groups.
//!
//! Group 14 (2048-bit) is used for the mandatory server<->client handshake;
//! Group 16 (4096-bit) is exposed for client-to-client key agreement, which
//! is out of scope for this crate's relay path (see spec §4.3).

use num_bigint::{BigUint, RandBigInt};
use num_traits::Num;
use once_cell::sync::Lazy;

/// A Diffie-Hellman group: a generator and a safe-prime modulus.
#[derive(Clone)]
pub struct Group {
    pub generator: BigUint,
    pub modulus: BigUint,
}

const GROUP14_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
    "129024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

const GROUP16_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD",
    "129024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D22 61AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

fn parse_group(hex_digits: &str, generator: u32) -> Group {
    let cleaned: String = hex_digits.chars().filter(|c| !c.is_whitespace()).collect();
    let modulus = BigUint::from_str_radix(&cleaned, 16).expect("hardcoded DH modulus is valid hex");
    Group {
        generator: BigUint::from(generator),
        modulus,
    }
}

pub static GROUP14_2048: Lazy<Group> = Lazy::new(|| parse_group(GROUP14_HEX, 2));
pub static GROUP16_4096: Lazy<Group> = Lazy::new(|| parse_group(GROUP16_HEX, 2));

/// Generate a private exponent in `[1, modulus)`.
pub fn generate_private(group: &Group) -> BigUint {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = rng.gen_biguint_below(&group.modulus);
        if candidate > BigUint::from(0u32) {
            return candidate;
        }
    }
}

/// Compute the public value `generator^private mod modulus`.
pub fn public_value(group: &Group, private: &BigUint) -> BigUint {
    group.generator.modpow(private, &group.modulus)
}

/// Compute the shared secret `peer_public^private mod modulus`.
pub fn shared_secret(group: &Group, private: &BigUint, peer_public: &BigUint) -> BigUint {
    peer_public.modpow(private, &group.modulus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_agree() {
        let group = &*GROUP14_2048;
        let a_priv = generate_private(group);
        let b_priv = generate_private(group);
        let a_pub = public_value(group, &a_priv);
        let b_pub = public_value(group, &b_priv);
        let a_shared = shared_secret(group, &a_priv, &b_pub);
        let b_shared = shared_secret(group, &b_priv, &a_pub);
        assert_eq!(a_shared, b_shared);
    }

    #[test]
    fn group16_is_larger() {
        assert!(GROUP16_4096.modulus > GROUP14_2048.modulus);
    }
}
