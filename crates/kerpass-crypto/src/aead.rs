//! The AEAD suite: AES-256-GCM and ChaCha20-Poly1305, with the nonce
//! byte-packing rule from spec.md §4.4 — AES-GCM lays the 8-byte counter
//! big-endian in positions 4..12 of the 12-byte nonce; ChaCha20-Poly1305
//! uses little-endian in the same positions.

use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key as AesKey, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaKey, Nonce as ChaNonce};
use kerpass_error::{Error, Result};

/// A closed set of AEAD algorithms (spec.md §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    AesGcm,
    ChaChaPoly,
}

impl CipherAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "AESGCM" => Ok(Self::AesGcm),
            "ChaChaPoly" => Ok(Self::ChaChaPoly),
            other => Err(Error::validation(format!("unknown cipher {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AesGcm => "AESGCM",
            Self::ChaChaPoly => "ChaChaPoly",
        }
    }

    pub fn key_len(&self) -> usize {
        32
    }

    fn format_nonce(&self, counter: u64) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        match self {
            Self::AesGcm => nonce[4..12].copy_from_slice(&counter.to_be_bytes()),
            Self::ChaChaPoly => nonce[4..12].copy_from_slice(&counter.to_le_bytes()),
        }
        nonce
    }

    /// AEAD seal. `key` must be exactly [`Self::key_len`] bytes.
    pub fn encrypt(&self, key: &[u8], counter: u64, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.format_nonce(counter);
        let payload = Payload { msg: plaintext, aad: ad };
        match self {
            Self::AesGcm => {
                let cipher = Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key));
                cipher
                    .encrypt(AesNonce::from_slice(&nonce), payload)
                    .map_err(|_| Error::authentication("AES-256-GCM seal failed"))
            }
            Self::ChaChaPoly => {
                let cipher = ChaCha20Poly1305::new(ChaKey::from_slice(key));
                cipher
                    .encrypt(ChaNonce::from_slice(&nonce), payload)
                    .map_err(|_| Error::authentication("ChaCha20-Poly1305 seal failed"))
            }
        }
    }

    /// AEAD open. Returns an `Authentication` error on MAC failure, without
    /// revealing anything about why.
    pub fn decrypt(&self, key: &[u8], counter: u64, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.format_nonce(counter);
        let payload = Payload { msg: ciphertext, aad: ad };
        match self {
            Self::AesGcm => {
                let cipher = Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key));
                cipher
                    .decrypt(AesNonce::from_slice(&nonce), payload)
                    .map_err(|_| Error::authentication("AES-256-GCM open failed"))
            }
            Self::ChaChaPoly => {
                let cipher = ChaCha20Poly1305::new(ChaKey::from_slice(key));
                cipher
                    .decrypt(ChaNonce::from_slice(&nonce), payload)
                    .map_err(|_| Error::authentication("ChaCha20-Poly1305 open failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(alg: CipherAlgorithm) {
        let key = [0x11u8; 32];
        let ad = b"associated data";
        let pt = b"hello KerPass";

        let ct = alg.encrypt(&key, 7, ad, pt).unwrap();
        let recovered = alg.decrypt(&key, 7, ad, &ct).unwrap();
        assert_eq!(recovered, pt);
    }

    #[test]
    fn aes_gcm_roundtrip() {
        roundtrip(CipherAlgorithm::AesGcm);
    }

    #[test]
    fn chachapoly_roundtrip() {
        roundtrip(CipherAlgorithm::ChaChaPoly);
    }

    #[test]
    fn tampered_ad_fails() {
        let key = [0x22u8; 32];
        let ct = CipherAlgorithm::AesGcm.encrypt(&key, 0, b"ad1", b"msg").unwrap();
        assert!(CipherAlgorithm::AesGcm.decrypt(&key, 0, b"ad2", &ct).is_err());
    }

    #[test]
    fn tampered_nonce_fails() {
        let key = [0x33u8; 32];
        let ct = CipherAlgorithm::ChaChaPoly.encrypt(&key, 1, b"ad", b"msg").unwrap();
        assert!(CipherAlgorithm::ChaChaPoly.decrypt(&key, 2, b"ad", &ct).is_err());
    }

    #[test]
    fn tampered_ciphertext_byte_fails() {
        let key = [0x44u8; 32];
        let mut ct = CipherAlgorithm::AesGcm.encrypt(&key, 3, b"ad", b"message").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(CipherAlgorithm::AesGcm.decrypt(&key, 3, b"ad", &ct).is_err());
    }

    #[test]
    fn nonce_byte_order_differs_between_ciphers() {
        assert_eq!(
            CipherAlgorithm::AesGcm.format_nonce(1),
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            CipherAlgorithm::ChaChaPoly.format_nonce(1),
            [0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]
        );
    }
}
