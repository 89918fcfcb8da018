//! The cryptographic primitive suites shared by the Noise protocol framework
//! and EPHEMSEC: AEAD, hash/HKDF, and Diffie-Hellman (spec.md §2).

pub mod aead;
pub mod dh;
pub mod hash;

pub use aead::CipherAlgorithm;
pub use dh::{Curve, KeyPair};
pub use hash::HashAlgorithm;
