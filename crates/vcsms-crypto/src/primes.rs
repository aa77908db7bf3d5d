//! Probabilistic prime generation for RSA-style keypairs.
//!
//! Grounded on `vcsms/cryptography/primes.py`'s sieve-then-Miller-Rabin
//! approach, expressed with `num-bigint` instead of hand-rolled bignum math.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};

const MILLER_RABIN_ROUNDS: u32 = 40;

/// Small-prime trial division sieve, used to cheaply reject obviously
/// composite candidates before paying for Miller-Rabin.
const SMALL_PRIMES: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

fn passes_sieve(n: &BigUint) -> bool {
    for &p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if n == &p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }
    true
}

/// Miller-Rabin primality test with a fixed round count, giving a false
/// positive probability below 2^-80 for any single call.
pub fn is_probable_prime(n: &BigUint) -> bool {
    let zero = BigUint::zero();
    let one = BigUint::one();
    let two = &one + &one;
    if n < &two {
        return false;
    }
    if n == &two {
        return true;
    }
    if (n % &two).is_zero() {
        return false;
    }
    if !passes_sieve(n) {
        return false;
    }

    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while (&d % &two) == zero {
        d /= &two;
        r += 1;
    }

    let mut rng = rand::thread_rng();
    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Generate a random probable prime with exactly `bits` bits (top and
/// bottom bit forced to 1, so the result has the expected bit length and
/// is odd).
pub fn generate_prime(bits: u64) -> BigUint {
    let mut rng = rand::thread_rng();
    loop {
        let mut candidate = rng.gen_biguint(bits);
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(0, true);
        if is_probable_prime(&candidate) {
            return candidate;
        }
    }
}
