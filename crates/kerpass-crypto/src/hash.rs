//! The hash suite: SHA-256/512, BLAKE2b/s, and the two HKDF flavors the rest
//! of the workspace needs — Noise's fixed `HKDF(ck, ikm, n)` (spec.md §4.2)
//! and RFC 5869's general extract-then-expand (spec.md §4.6).

use blake2::{Blake2b512, Blake2s256};
use hkdf::Hkdf;
use hmac::{Mac, SimpleHmac};
use kerpass_error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};

/// A closed set of hash algorithms; spec.md §9 asks that this seam be either
/// a fixed set of variants or a small trait, not an open trait-object zoo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake2b,
    Blake2s,
}

impl HashAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            "BLAKE2b" => Ok(Self::Blake2b),
            "BLAKE2s" => Ok(Self::Blake2s),
            other => Err(Error::validation(format!("unknown hash algorithm {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Blake2b => "BLAKE2b",
            Self::Blake2s => "BLAKE2s",
        }
    }

    /// Digest length in bytes: 32 for SHA-256/BLAKE2s, 64 for SHA-512/BLAKE2b.
    pub fn hash_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake2s => 32,
            Self::Sha512 | Self::Blake2b => 64,
        }
    }

    /// `Hash(data1 || data2 || ...)` without materializing the concatenation.
    pub fn hash(&self, parts: &[&[u8]]) -> Vec<u8> {
        macro_rules! digest_concat {
            ($t:ty) => {{
                let mut h = <$t>::new();
                for p in parts {
                    h.update(p);
                }
                h.finalize().to_vec()
            }};
        }
        match self {
            Self::Sha256 => digest_concat!(Sha256),
            Self::Sha512 => digest_concat!(Sha512),
            Self::Blake2b => digest_concat!(Blake2b512),
            Self::Blake2s => digest_concat!(Blake2s256),
        }
    }

    /// Keyed MAC under this hash, exposed for callers (e.g. session-id
    /// tagging) that need a plain HMAC rather than the HKDF flavors below.
    pub fn hmac(&self, key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
        macro_rules! hmac_concat {
            ($t:ty) => {{
                let mut m = SimpleHmac::<$t>::new_from_slice(key)
                    .expect("HMAC accepts a key of any length");
                for p in parts {
                    m.update(p);
                }
                m.finalize().into_bytes().to_vec()
            }};
        }
        match self {
            Self::Sha256 => hmac_concat!(Sha256),
            Self::Sha512 => hmac_concat!(Sha512),
            Self::Blake2b => hmac_concat!(Blake2b512),
            Self::Blake2s => hmac_concat!(Blake2s256),
        }
    }

    /// Noise's `HKDF(chaining_key, input_key_material, num_outputs)`:
    /// `num_outputs` outputs of `hash_len` bytes each (spec.md §4.2,
    /// `num_outputs` is 2 for `MixKey`, 3 for `MixKeyAndHash`/`Split`). This
    /// is RFC 5869 extract-then-expand with `chaining_key` as salt and an
    /// empty `info`, chunked into `hash_len`-sized outputs.
    pub fn hkdf_noise(&self, chaining_key: &[u8], ikm: &[u8], num_outputs: usize) -> Vec<Vec<u8>> {
        let hash_len = self.hash_len();
        let okm = self.hkdf_expand(chaining_key, ikm, &[], hash_len * num_outputs);
        okm.chunks(hash_len).map(<[u8]>::to_vec).collect()
    }

    /// General RFC 5869 extract-then-expand HKDF producing `len` bytes, used
    /// by EPHEMSEC derivation (spec.md §4.6) where the output length is not
    /// pinned to a multiple of the hash length.
    pub fn hkdf_expand(&self, salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Vec<u8> {
        macro_rules! expand {
            ($t:ty) => {{
                let hk = Hkdf::<$t>::new(Some(salt), ikm);
                let mut okm = vec![0u8; len];
                hk.expand(info, &mut okm).expect("len fits RFC 5869's 255*hash_len limit");
                okm
            }};
        }
        match self {
            Self::Sha256 => expand!(Sha256),
            Self::Sha512 => expand!(Sha512),
            Self::Blake2b => expand!(Blake2b512),
            Self::Blake2s => expand!(Blake2s256),
        }
    }
}
