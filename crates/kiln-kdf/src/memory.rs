//! Owned key material handed back to callers.
//!
//! Every key returned by the derivation state is an independent copy of the
//! leading bytes of the running `T` buffer. Holding on to (or dropping) a
//! [`DerivedKey`] never affects later iterations.
//!
//! - Zeroized on drop (via [`secrecy`])
//! - Masked in `Debug`/`Display`

use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;

/// Variable-length derived key.
pub struct DerivedKey {
    inner: SecretSlice<u8>,
}

impl DerivedKey {
    /// Copy `data` into a new key allocation.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            inner: data.to_vec().into(),
        }
    }

    /// Expose the underlying bytes.
    ///
    /// The returned slice borrows `self`; keep the exposure short-lived.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes in the key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    /// Returns `true` if the key holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for DerivedKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(***)")
    }
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(***)")
    }
}
