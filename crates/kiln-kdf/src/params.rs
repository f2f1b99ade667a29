//! Stored PBKDF2 parameter sets, presets, and calibration.
//!
//! This module provides:
//! - [`Pbkdf2Params`] — serializable parameter set (stored beside ciphertext)
//! - [`KdfPreset`] — Fast / Balanced / Maximum time targets
//! - [`calibrate`] — measure how many iterations fit in a time target
//! - [`generate_salt`] — random salt from the OS CSPRNG
//!
//! # Fixed vs. time-bounded derivation
//!
//! A parameter set pins the iteration count, so the same key comes out on
//! every machine. Time-bounded derivation ([`Pbkdf2::derive`]) discovers the
//! count instead; callers that do not store it must rediscover it with
//! [`Pbkdf2::search`] under a [`KdfPreset::search_budget`].

use crate::error::KdfError;
use crate::memory::DerivedKey;
use crate::pbkdf2::Pbkdf2;
use crate::prf::PrfAlgorithm;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroize;

/// Minimum salt length in bytes (RFC 2898 §4.1 asks for at least 64 bits).
pub const MIN_SALT_LEN: usize = 8;

/// Default salt length for [`generate_salt`] callers.
pub const DEFAULT_SALT_LEN: usize = 16;

/// Default derived key length (256 bits).
pub const DEFAULT_KEY_LEN: usize = 32;

/// Multiplier applied to a derive target to get a search budget.
const SEARCH_FACTOR: u32 = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// PBKDF2 parameter set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    /// HMAC hash.
    pub algorithm: PrfAlgorithm,
    /// Total iteration count.
    pub iterations: u64,
    /// Derived key length in bytes.
    pub key_len: usize,
}

impl Pbkdf2Params {
    /// Check that the parameters can be used for a derivation.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `iterations` or `key_len` is
    /// zero.
    pub fn validate(&self) -> Result<(), KdfError> {
        if self.iterations == 0 {
            return Err(KdfError::InvalidArgument(
                "iteration count must be positive".into(),
            ));
        }
        if self.key_len == 0 {
            return Err(KdfError::InvalidArgument(
                "key length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Fresh incremental state for these parameters, at zero iterations.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if the parameters are invalid.
    pub fn state(&self, password: &[u8], salt: &[u8]) -> Result<Pbkdf2, KdfError> {
        self.validate()?;
        Pbkdf2::new(password, salt, self.key_len, self.algorithm)
    }

    /// Derive the key for `password` and `salt`.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if the parameters are invalid.
    pub fn derive(&self, password: &[u8], salt: &[u8]) -> Result<DerivedKey, KdfError> {
        self.state(password, salt)?.next(self.iterations)
    }
}

/// Time target selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfPreset {
    /// Interactive use (~250 ms).
    Fast,
    /// Recommended default (~1 s).
    Balanced,
    /// Long-term secrets (~3 s).
    Maximum,
}

impl KdfPreset {
    /// Target derivation time.
    #[must_use]
    pub const fn target(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(250),
            Self::Balanced => Duration::from_secs(1),
            Self::Maximum => Duration::from_secs(3),
        }
    }

    /// Time to allow a [`Pbkdf2::search`] for a key derived with this preset.
    #[must_use]
    pub const fn search_budget(self) -> Duration {
        self.target().saturating_mul(SEARCH_FACTOR)
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Measure how many iterations of `algorithm` fit in `target` on this
/// machine and return them as a parameter set.
///
/// Runs a time-bounded derivation over a throwaway password and random salt.
///
/// # Errors
///
/// Returns `KdfError::InvalidArgument` for a zero `key_len`, and propagates
/// CPU-clock, worker, and RNG failures.
pub fn calibrate(
    algorithm: PrfAlgorithm,
    key_len: usize,
    target: Duration,
) -> Result<Pbkdf2Params, KdfError> {
    let salt = generate_salt(DEFAULT_SALT_LEN)?;
    let mut kdf = Pbkdf2::new(b"calibration_probe", &salt, key_len, algorithm)?;
    drop(kdf.derive(target)?);
    let params = Pbkdf2Params {
        algorithm,
        iterations: kdf.iters(),
        key_len,
    };
    tracing::debug!(?algorithm, iterations = params.iterations, ?target, "calibrated");
    Ok(params)
}

/// Calibrate for a preset's target with a [`DEFAULT_KEY_LEN`] key.
///
/// # Errors
///
/// See [`calibrate`].
pub fn calibrate_preset(
    preset: KdfPreset,
    algorithm: PrfAlgorithm,
) -> Result<Pbkdf2Params, KdfError> {
    calibrate(algorithm, DEFAULT_KEY_LEN, preset.target())
}

// ---------------------------------------------------------------------------
// Salt
// ---------------------------------------------------------------------------

/// Random salt of `len` bytes from the OS CSPRNG.
///
/// # Errors
///
/// Returns `KdfError::InvalidArgument` if `len < MIN_SALT_LEN`, or
/// `KdfError::Rng` if the CSPRNG fails.
pub fn generate_salt(len: usize) -> Result<Vec<u8>, KdfError> {
    if len < MIN_SALT_LEN {
        return Err(KdfError::InvalidArgument(format!(
            "salt too short: {len} bytes (minimum {MIN_SALT_LEN})"
        )));
    }
    let mut salt = vec![0u8; len];
    if let Err(e) = OsRng.try_fill_bytes(&mut salt) {
        salt.zeroize();
        return Err(KdfError::Rng(format!("CSPRNG fill failed: {e}")));
    }
    Ok(salt)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
