//! `SymmetricState`: the running handshake hash and chaining key, and the
//! single `CipherState` they feed as handshake messages are processed
//! (spec.md §4.2).

use kerpass_crypto::{CipherAlgorithm, HashAlgorithm};
use kerpass_error::Result;

use crate::transport::CipherState;

/// `h`, `ck`, and an embedded [`CipherState`] (spec.md §4.2).
pub struct SymmetricState {
    hash: HashAlgorithm,
    cipher: CipherAlgorithm,
    h: Vec<u8>,
    ck: Vec<u8>,
    cipher_state: CipherState,
}

impl SymmetricState {
    /// `Initialize(protocol_name)`: `h` is `protocol_name` zero-padded (or
    /// hashed down) to `hash_len` bytes; `ck` starts equal to `h`.
    pub fn initialize(hash: HashAlgorithm, cipher: CipherAlgorithm, protocol_name: &[u8]) -> Self {
        let hash_len = hash.hash_len();
        let h = if protocol_name.len() <= hash_len {
            let mut padded = protocol_name.to_vec();
            padded.resize(hash_len, 0);
            padded
        } else {
            hash.hash(&[protocol_name])
        };
        let ck = h.clone();
        SymmetricState {
            hash,
            cipher,
            h,
            ck,
            cipher_state: CipherState::empty(cipher),
        }
    }

    pub fn handshake_hash(&self) -> &[u8] {
        &self.h
    }

    /// Whether the embedded cipher state currently holds a key — i.e.
    /// whether `EncryptAndHash`/`DecryptAndHash` will actually encrypt.
    pub fn has_key(&self) -> bool {
        self.cipher_state.has_key()
    }

    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = self.hash.hash(&[&self.h, data]);
    }

    /// `MixKey(ikm)`: derives a fresh `ck` and transport key from `ck` and
    /// `ikm`, then resets the embedded cipher's nonce.
    pub fn mix_key(&mut self, ikm: &[u8]) {
        let outputs = self.hash.hkdf_noise(&self.ck, ikm, 2);
        self.ck = outputs[0].clone();
        let key = truncate_key(&outputs[1]);
        self.cipher_state = CipherState::keyed(self.cipher, key);
    }

    /// `MixKeyAndHash(ikm)`: as `MixKey`, but also mixes a third HKDF output
    /// into `h` (used by `psk` tokens).
    pub fn mix_key_and_hash(&mut self, ikm: &[u8]) {
        let outputs = self.hash.hkdf_noise(&self.ck, ikm, 3);
        self.ck = outputs[0].clone();
        self.mix_hash(&outputs[1]);
        let key = truncate_key(&outputs[2]);
        self.cipher_state = CipherState::keyed(self.cipher, key);
    }

    /// `EncryptAndHash`: encrypts (if keyed) under `h` as associated data,
    /// then mixes the resulting ciphertext into `h`.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = if self.cipher_state.has_key() {
            self.cipher_state.encrypt_with_ad(&self.h, plaintext)?
        } else {
            plaintext.to_vec()
        };
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// `DecryptAndHash`: the inverse of [`Self::encrypt_and_hash`].
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let plaintext = if self.cipher_state.has_key() {
            self.cipher_state.decrypt_with_ad(&self.h, ciphertext)?
        } else {
            ciphertext.to_vec()
        };
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// `Split`: derives the two directional transport cipher keys from `ck`.
    pub fn split(&self) -> (CipherState, CipherState) {
        let outputs = self.hash.hkdf_noise(&self.ck, &[], 2);
        (
            CipherState::keyed(self.cipher, truncate_key(&outputs[0])),
            CipherState::keyed(self.cipher, truncate_key(&outputs[1])),
        )
    }
}

/// HKDF outputs are `hash_len` bytes; cipher keys are always 32 bytes, so a
/// 64-byte (SHA-512/BLAKE2b) output is truncated (spec.md §4.2).
fn truncate_key(material: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    key.copy_from_slice(&material[..32]);
    key
}
