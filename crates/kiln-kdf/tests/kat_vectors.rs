#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! PBKDF2 Known-Answer Test vectors.
//!
//! RFC 6070 (HMAC-SHA1) and RFC 7914 §11 (HMAC-SHA256). Each vector is
//! checked both as a single `next(c)` and split across several calls whose
//! counts sum to `c`.

use kiln_kdf::{key, Pbkdf2, PrfAlgorithm};

struct Vector {
    algorithm: PrfAlgorithm,
    password: &'static [u8],
    salt: &'static [u8],
    /// Iteration batches passed to successive `next` calls.
    batches: &'static [u64],
    key_len: usize,
    expected: &'static str,
}

const RFC6070_C4096: &str = "4b007901b765489abead49d926f721d065a429c1";

const VECTORS: &[Vector] = &[
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[1],
        key_len: 20,
        expected: "0c60c80f961f0e71f3a9b524af6012062fe037a6",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[2],
        key_len: 20,
        expected: "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[1, 1],
        key_len: 20,
        expected: "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[4096],
        key_len: 20,
        expected: RFC6070_C4096,
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[1, 4095],
        key_len: 20,
        expected: RFC6070_C4096,
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[2048, 2048],
        key_len: 20,
        expected: RFC6070_C4096,
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[4095, 1],
        key_len: 20,
        expected: RFC6070_C4096,
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"password",
        salt: b"salt",
        batches: &[1, 4094, 1],
        key_len: 20,
        expected: RFC6070_C4096,
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"passwordPASSWORDpassword",
        salt: b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
        batches: &[4096],
        key_len: 25,
        expected: "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha1,
        password: b"pass\x00word",
        salt: b"sa\x00lt",
        batches: &[4096],
        key_len: 16,
        expected: "56fa6aa75548099dcc37d7f03425e0c3",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha256,
        password: b"passwd",
        salt: b"salt",
        batches: &[1],
        key_len: 64,
        expected: "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc\
                   49ca9cccf179b645991664b39d77ef317c71b845b1e30bd509112041d3a19783",
    },
    Vector {
        algorithm: PrfAlgorithm::Sha256,
        password: b"Password",
        salt: b"NaCl",
        batches: &[40_000, 40_000],
        key_len: 64,
        expected: "4ddcd8f60b98be21830cee5ef22701f9641a4418d04c0414aeff08876b34ab56\
                   a1d425a1225833549adb841b51c9b3176a272bdebba1d078478f62b397f33c8d",
    },
];

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[test]
fn rfc_vectors_incremental() {
    for (n, v) in VECTORS.iter().enumerate() {
        let mut kdf = Pbkdf2::new(v.password, v.salt, v.key_len, v.algorithm).unwrap();
        let mut dk = None;
        for &c in v.batches {
            dk = Some(kdf.next(c).unwrap());
        }
        let dk = dk.expect("every vector has at least one batch");
        assert_eq!(hex(dk.expose()), v.expected, "vector {n}");
        assert_eq!(kdf.iters(), v.batches.iter().sum::<u64>(), "vector {n}");
    }
}

#[test]
fn rfc_vectors_one_shot() {
    for (n, v) in VECTORS.iter().enumerate() {
        let total = v.batches.iter().sum();
        let dk = key(v.password, v.salt, total, v.key_len, v.algorithm).unwrap();
        assert_eq!(hex(dk.expose()), v.expected, "vector {n}");
    }
}

/// Python `hashlib.pbkdf2_hmac("sha512", b"password", b"salt", 2, 64)`.
#[test]
fn sha512_two_iterations() {
    let dk = key(b"password", b"salt", 2, 64, PrfAlgorithm::Sha512).unwrap();
    assert_eq!(
        hex(dk.expose()),
        "e1d9c16aa681708a45f5c7c4e215ceb66e011a2e9f0040713f18aefdb866d53c\
         f76cab2868a39b9f7840edce4fef5a82be67335c77a6068e04112754f27ccf4e"
    );
}
