//! The persisted records enrollment exchanges, as distinct from the wire
//! messages that carry pieces of them between client and server (spec.md
//! §3 "Card / ServerCard / ServerKey / EnrollAuthorization").

use kerpass_crypto::Curve;

/// The client's credential for one realm, minted on a successful enrollment.
#[derive(Clone)]
pub struct Card {
    pub realm_id: Vec<u8>,
    pub card_id: [u8; 32],
    /// The static private key generated before the handshake started; it
    /// becomes the card's private key only if enrollment succeeds.
    pub client_private_key: Vec<u8>,
    pub psk: [u8; 32],
    pub app_name: String,
}

/// The server's mirror of a [`Card`]: the client's public key and the same
/// PSK, keyed by `card_id` in [`crate::store::MemServerCredStore`].
#[derive(Clone)]
pub struct ServerCard {
    pub realm_id: Vec<u8>,
    pub card_id: [u8; 32],
    pub client_public_key: Vec<u8>,
    pub psk: [u8; 32],
}

/// A realm's static identity: the Noise static keypair the server presents
/// during enrollment, plus its certificate bytes (PKI validation of which is
/// a stub — see the enrollment protocol's client-side notes).
#[derive(Clone)]
pub struct ServerKey {
    pub realm_id: Vec<u8>,
    pub curve: Curve,
    pub static_private_key: Vec<u8>,
    pub certificate: Vec<u8>,
}

/// A one-time token authorizing exactly one enrollment, consumed atomically
/// when the server processes the client's `enroll-authorization` message.
#[derive(Clone)]
pub struct EnrollAuthorization {
    pub authorization_id: [u8; 32],
    pub realm_id: Vec<u8>,
    pub app_identity: String,
}
