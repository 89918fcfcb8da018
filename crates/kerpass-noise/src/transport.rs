//! `CipherState` and the post-handshake transport cipher pair (spec.md §4.4).

use kerpass_crypto::CipherAlgorithm;
use kerpass_error::{Error, Result};

/// The largest Noise message (handshake or transport), in bytes (spec.md
/// §4.4, §8 invariant 6).
pub const MAX_MESSAGE_LEN: usize = 65535;

/// `n = 2^64 - 1` is reserved: the Noise spec forbids ever using it as a
/// nonce, so it doubles as "this cipher state is exhausted".
const NONCE_EXHAUSTED: u64 = u64::MAX;

/// The AEAD authentication tag length all of `kerpass-crypto`'s ciphers use.
const TAG_LEN: usize = 16;

/// A single directional AEAD key plus its strictly increasing nonce
/// counter. `None` key means "no encryption yet" (spec.md §4.2/§4.4).
#[derive(Clone)]
pub struct CipherState {
    algorithm: CipherAlgorithm,
    key: Option<[u8; 32]>,
    nonce: u64,
}

impl CipherState {
    pub fn empty(algorithm: CipherAlgorithm) -> Self {
        CipherState {
            algorithm,
            key: None,
            nonce: 0,
        }
    }

    pub fn keyed(algorithm: CipherAlgorithm, key: [u8; 32]) -> Self {
        CipherState {
            algorithm,
            key: Some(key),
            nonce: 0,
        }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// `Rekey()`: encrypts 32 zero bytes under the reserved nonce and
    /// installs the result as the new key; the regular nonce counter is
    /// left untouched (spec.md §4.4).
    pub fn rekey(&mut self) -> Result<()> {
        let key = self.key.ok_or_else(|| Error::sequence("rekey called on an unkeyed cipher state"))?;
        let output = self.algorithm.encrypt(&key, NONCE_EXHAUSTED, &[], &[0u8; 32])?;
        let mut new_key = [0u8; 32];
        new_key.copy_from_slice(&output[..32]);
        self.key = Some(new_key);
        Ok(())
    }

    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.len() + TAG_LEN > MAX_MESSAGE_LEN {
            return Err(Error::size_limit(format!(
                "ciphertext of {} bytes would exceed the {MAX_MESSAGE_LEN}-byte message limit",
                plaintext.len() + TAG_LEN
            )));
        }
        let key = self.key.ok_or_else(|| Error::sequence("encrypt called on an unkeyed cipher state"))?;
        if self.nonce == NONCE_EXHAUSTED {
            return Err(Error::sequence("cipher state's nonce space is exhausted"));
        }
        let ciphertext = self.algorithm.encrypt(&key, self.nonce, ad, plaintext)?;
        self.nonce += 1;
        Ok(ciphertext)
    }

    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() > MAX_MESSAGE_LEN {
            return Err(Error::size_limit(format!(
                "ciphertext of {} bytes exceeds the {MAX_MESSAGE_LEN}-byte message limit",
                ciphertext.len()
            )));
        }
        let key = self.key.ok_or_else(|| Error::sequence("decrypt called on an unkeyed cipher state"))?;
        if self.nonce == NONCE_EXHAUSTED {
            return Err(Error::sequence("cipher state's nonce space is exhausted"));
        }
        let plaintext = self.algorithm.decrypt(&key, self.nonce, ad, ciphertext)?;
        self.nonce += 1;
        Ok(plaintext)
    }
}

/// The two directional `CipherState`s a completed handshake `Split`s into.
/// `send`/`receive` are fixed at construction so initiator and responder
/// each get the correct half without a runtime role check.
pub struct TransportKeys {
    send: CipherState,
    receive: CipherState,
}

impl TransportKeys {
    pub fn new(send: CipherState, receive: CipherState) -> Self {
        TransportKeys { send, receive }
    }

    pub fn send(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.send.encrypt_with_ad(&[], plaintext)
    }

    pub fn receive(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.receive.decrypt_with_ad(&[], ciphertext)
    }

    pub fn rekey_send(&mut self) -> Result<()> {
        self.send.rekey()
    }

    pub fn rekey_receive(&mut self) -> Result<()> {
        self.receive.rekey()
    }
}
