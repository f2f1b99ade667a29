//! `kiln-kdf` — Incremental PBKDF2 (RFC 2898) with time-bounded derivation.
//!
//! The derivation state can be resumed: extending a key from N to N + M
//! iterations costs M iterations, not N + M. On top of that, keys can be
//! derived for "about T seconds" ([`Pbkdf2::derive`]) and rediscovered
//! later within a time limit ([`Pbkdf2::search`]) without ever storing the
//! iteration count.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::time::Duration;
//! use kiln_kdf::{Pbkdf2, PrfAlgorithm, Probe};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut kdf = Pbkdf2::new(b"password", b"per-user salt", 32, PrfAlgorithm::Sha256)?;
//! let key = kdf.derive(Duration::from_millis(500))?;
//!
//! let mut again = Pbkdf2::new(b"password", b"per-user salt", 32, PrfAlgorithm::Sha256)?;
//! let found = again
//!     .search(Duration::from_secs(2), |dk| {
//!         Probe::<Infallible>::found_if(dk == key.expose())
//!     })?;
//! assert_eq!(found.expose(), key.expose());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod prf;

pub mod cputime;
pub mod timer;

pub mod pbkdf2;

pub mod control;

pub mod params;

pub use control::{Precision, Probe, INITIAL_ITERATIONS, MAX_PRECISION};
pub use cputime::{cpu_time, Clock, SystemClock};
pub use error::{KdfError, SearchError};
pub use memory::DerivedKey;
pub use params::{
    calibrate, calibrate_preset, generate_salt, KdfPreset, Pbkdf2Params, DEFAULT_KEY_LEN,
    DEFAULT_SALT_LEN, MIN_SALT_LEN,
};
pub use pbkdf2::{key, Pbkdf2};
pub use prf::{Hmac, Prf, PrfAlgorithm};
