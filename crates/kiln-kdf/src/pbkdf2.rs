//! Incremental PBKDF2 (RFC 2898 §5.2).
//!
//! [`Pbkdf2`] keeps the running `T` and `U` blocks between calls, so a key
//! derived with 1000 iterations can be extended to 2000 without repeating
//! the first 1000. `next(a)` followed by `next(b)` produces the same key as
//! a single `next(a + b)`.
//!
//! ```text
//! U_1 = PRF(P, S || INT(i))       first call, one block per i
//! U_k = PRF(P, U_{k-1})           every further iteration
//! T_i = U_1 ^ U_2 ^ ... ^ U_c
//! DK  = T_1 || T_2 || ... truncated to key_len
//! ```

use crate::error::KdfError;
use crate::memory::DerivedKey;
use crate::prf::{Hmac, Prf, PrfAlgorithm};
use zeroize::Zeroize;

/// Incremental PBKDF2 state.
///
/// The state is exclusively owned: it is `Send` when its PRF is, but every
/// mutating method takes `&mut self`, so no two operations can run on the
/// same instance at once.
pub struct Pbkdf2<P: Prf = Hmac> {
    prf: P,
    salt: Vec<u8>,
    key_len: usize,
    /// XOR-accumulated output blocks. `len >= key_len`, multiple of the
    /// digest size; empty while `iters == 0`.
    t: Vec<u8>,
    /// Most recent `U` block per output block. Same length as `t`.
    u: Vec<u8>,
    iters: u64,
}

impl Pbkdf2<Hmac> {
    /// Create a state at zero iterations using HMAC keyed with `password`.
    ///
    /// The salt is copied; the caller's buffer may be reused afterward.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `key_len` is zero or exceeds
    /// `(2^32 - 1) * digest_size`.
    pub fn new(
        password: &[u8],
        salt: &[u8],
        key_len: usize,
        algorithm: PrfAlgorithm,
    ) -> Result<Self, KdfError> {
        Self::with_prf(Hmac::new(algorithm, password), salt, key_len)
    }
}

impl<P: Prf> Pbkdf2<P> {
    /// Create a state at zero iterations around an already keyed PRF.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `key_len` is zero or exceeds
    /// `(2^32 - 1) * digest_size`, or if the PRF reports a zero digest size.
    pub fn with_prf(prf: P, salt: &[u8], key_len: usize) -> Result<Self, KdfError> {
        check_key_len(key_len, prf.output_len())?;
        Ok(Self {
            prf,
            salt: salt.to_vec(),
            key_len,
            t: Vec::new(),
            u: Vec::new(),
            iters: 0,
        })
    }

    /// Run `count` additional iterations and return a copy of the new key.
    ///
    /// The first call after construction or [`reset`](Self::reset) spends one
    /// of its iterations computing `U_1` from the salt.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `count` is zero. The state is
    /// left untouched in that case.
    pub fn next(&mut self, count: u64) -> Result<DerivedKey, KdfError> {
        if count == 0 {
            return Err(KdfError::InvalidArgument(
                "iteration count must be positive".into(),
            ));
        }

        let mut rounds = count;
        if self.iters == 0 {
            self.init_blocks();
            rounds = rounds.wrapping_sub(1);
        }

        let h = self.prf.output_len();
        for _ in 0..rounds {
            for block in self.u.chunks_exact_mut(h) {
                self.prf.update(block);
                self.prf.finalize_into(block);
            }
            for (t, u) in self.t.iter_mut().zip(&self.u) {
                *t ^= u;
            }
        }
        self.iters = self.iters.saturating_add(count);
        Ok(self.key())
    }

    /// Return to zero iterations.
    ///
    /// `salt` and `key_len`, when given, replace the values used by
    /// subsequent iterations. A `key_len` of zero keeps the current size,
    /// like `None`. The PRF keeps its password.
    ///
    /// # Errors
    ///
    /// Returns `KdfError::InvalidArgument` if `key_len` is too long.
    /// Nothing is changed in that case.
    pub fn reset(&mut self, salt: Option<&[u8]>, key_len: Option<usize>) -> Result<(), KdfError> {
        if let Some(key_len) = key_len.filter(|&n| n != 0) {
            check_key_len(key_len, self.prf.output_len())?;
            self.key_len = key_len;
        }
        if let Some(salt) = salt {
            self.salt = salt.to_vec();
        }
        self.clear();
        Ok(())
    }

    /// Copy of the current salt.
    #[must_use]
    pub fn salt(&self) -> Vec<u8> {
        self.salt.clone()
    }

    /// Derived key size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.key_len
    }

    /// Total iterations performed since construction or the last reset.
    #[must_use]
    pub const fn iters(&self) -> u64 {
        self.iters
    }

    /// Copy of the key at the current iteration count, or `None` before the
    /// first iteration.
    #[must_use]
    pub fn current_key(&self) -> Option<DerivedKey> {
        (self.iters > 0).then(|| self.key())
    }

    pub(crate) fn clear(&mut self) {
        self.t.zeroize();
        self.u.zeroize();
        self.iters = 0;
    }

    /// `T = U = U_1` for every output block.
    fn init_blocks(&mut self) {
        let h = self.prf.output_len();
        let blocks = self.key_len.div_ceil(h);
        self.t = vec![0u8; blocks.saturating_mul(h)];
        for (i, block) in (1u32..).zip(self.t.chunks_exact_mut(h)) {
            self.prf.reset();
            self.prf.update(&self.salt);
            self.prf.update(&i.to_be_bytes());
            self.prf.finalize_into(block);
        }
        self.u = self.t.clone();
    }

    fn key(&self) -> DerivedKey {
        DerivedKey::new(self.t.get(..self.key_len).unwrap_or_default())
    }
}

impl<P: Prf> Drop for Pbkdf2<P> {
    fn drop(&mut self) {
        self.t.zeroize();
        self.u.zeroize();
    }
}

/// Derive a key with a fixed iteration count in one call.
///
/// # Errors
///
/// Returns `KdfError::InvalidArgument` if `iterations` is zero or `key_len`
/// is invalid.
pub fn key(
    password: &[u8],
    salt: &[u8],
    iterations: u64,
    key_len: usize,
    algorithm: PrfAlgorithm,
) -> Result<DerivedKey, KdfError> {
    Pbkdf2::new(password, salt, key_len, algorithm)?.next(iterations)
}

/// RFC 2898 §5.2 step 1: `dkLen <= (2^32 - 1) * hLen`.
fn check_key_len(key_len: usize, h_len: usize) -> Result<(), KdfError> {
    if h_len == 0 {
        return Err(KdfError::InvalidArgument(
            "PRF digest size must be positive".into(),
        ));
    }
    if key_len == 0 {
        return Err(KdfError::InvalidArgument(
            "key length must be positive".into(),
        ));
    }
    let max = u64::from(u32::MAX).saturating_mul(h_len as u64);
    if key_len as u64 > max {
        return Err(KdfError::InvalidArgument(format!(
            "derived key too long: {key_len} bytes (maximum {max})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
