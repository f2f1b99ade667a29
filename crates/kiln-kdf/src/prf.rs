//! Keyed pseudorandom functions for PBKDF2.
//!
//! The derivation state only needs four things from its PRF: reset, absorb
//! bytes, emit a fixed-size digest, and report that size. [`Prf`] captures
//! exactly that; [`Hmac`] implements it over `ring::hmac` for the algorithms
//! listed in [`PrfAlgorithm`].

use ring::hmac;
use serde::{Deserialize, Serialize};

/// Keyed pseudorandom function capability.
///
/// The key (the PBKDF2 password) is bound at construction and never changes.
pub trait Prf {
    /// Digest size in bytes.
    fn output_len(&self) -> usize;

    /// Discard any absorbed input.
    fn reset(&mut self);

    /// Absorb `data`. May be called repeatedly before finalizing.
    fn update(&mut self, data: &[u8]);

    /// Write the digest of everything absorbed since the last reset into
    /// `out` and reset.
    ///
    /// `out` must be exactly [`output_len`](Self::output_len) bytes long.
    fn finalize_into(&mut self, out: &mut [u8]);
}

/// HMAC hash selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrfAlgorithm {
    /// HMAC-SHA1. Only for interoperability with legacy PBKDF2 users
    /// (RFC 6070 vectors, older key files).
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA384.
    Sha384,
    /// HMAC-SHA512.
    Sha512,
}

impl PrfAlgorithm {
    /// Digest size in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Map to the corresponding `ring::hmac::Algorithm`.
    fn to_ring_algorithm(self) -> hmac::Algorithm {
        match self {
            Self::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => hmac::HMAC_SHA256,
            Self::Sha384 => hmac::HMAC_SHA384,
            Self::Sha512 => hmac::HMAC_SHA512,
        }
    }
}

/// HMAC keyed with a password.
pub struct Hmac {
    key: hmac::Key,
    ctx: hmac::Context,
    output_len: usize,
}

impl Hmac {
    /// Key a new HMAC instance with `password`.
    #[must_use]
    pub fn new(algorithm: PrfAlgorithm, password: &[u8]) -> Self {
        let key = hmac::Key::new(algorithm.to_ring_algorithm(), password);
        let ctx = hmac::Context::with_key(&key);
        Self {
            key,
            ctx,
            output_len: algorithm.output_len(),
        }
    }
}

impl Prf for Hmac {
    fn output_len(&self) -> usize {
        self.output_len
    }

    fn reset(&mut self) {
        self.ctx = hmac::Context::with_key(&self.key);
    }

    fn update(&mut self, data: &[u8]) {
        self.ctx.update(data);
    }

    fn finalize_into(&mut self, out: &mut [u8]) {
        let ctx = std::mem::replace(&mut self.ctx, hmac::Context::with_key(&self.key));
        out.copy_from_slice(ctx.sign().as_ref());
    }
}
