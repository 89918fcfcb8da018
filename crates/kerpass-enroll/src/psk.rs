//! PSK derivation for the enrollment handshake's two `psk` tokens (spec.md
//! §4.9 "PSK derivation").
//!
//! The pattern mixes a PSK before message 3 (`<- psk, {card-create-response}`)
//! and again before message 4 (`-> psk, {}`). A `psk` token is always mixed
//! in *before* that message's payload is decrypted, so neither side can use
//! anything first revealed by the very payload the PSK gates:
//!
//! - Message 3's ciphertext is what first reveals `card_id` and the
//!   server's `server_psk_share` to the client, so the PSK guarding it
//!   ([`derive_binding_psk`]) can only draw on what both sides already hold
//!   beforehand: the realm id, the running handshake hash, and the client's
//!   own `client_psk_share` (sent, and so known to the server, in message 2).
//! - By message 4, both sides hold every input, so [`derive_card_psk`] mixes
//!   in `card_id` per the formula above plus both shares, and its result
//!   becomes the card's long-term PSK.
use kerpass_crypto::HashAlgorithm;

const SALT: &[u8] = b"KerPass-Enroll-PSK";

/// PSK for the handshake's first `psk` token (gates message 3).
pub fn derive_binding_psk(realm_id: &[u8], handshake_hash: &[u8], client_share: &[u8]) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(realm_id.len() + handshake_hash.len() + client_share.len());
    ikm.extend_from_slice(realm_id);
    ikm.extend_from_slice(handshake_hash);
    ikm.extend_from_slice(client_share);
    hkdf32(&ikm)
}

/// PSK for the handshake's second `psk` token (gates message 4): the card's
/// long-term PSK, persisted in both [`crate::records::Card`] and
/// [`crate::records::ServerCard`].
pub fn derive_card_psk(
    realm_id: &[u8],
    card_id: &[u8; 32],
    handshake_hash: &[u8],
    client_share: &[u8],
    server_share: &[u8],
) -> [u8; 32] {
    let mut ikm =
        Vec::with_capacity(realm_id.len() + 32 + handshake_hash.len() + client_share.len() + server_share.len());
    ikm.extend_from_slice(realm_id);
    ikm.extend_from_slice(card_id);
    ikm.extend_from_slice(handshake_hash);
    ikm.extend_from_slice(client_share);
    ikm.extend_from_slice(server_share);
    hkdf32(&ikm)
}

fn hkdf32(ikm: &[u8]) -> [u8; 32] {
    let okm = HashAlgorithm::Sha256.hkdf_expand(SALT, ikm, b"", 32);
    let mut psk = [0u8; 32];
    psk.copy_from_slice(&okm);
    psk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_psk_is_deterministic_given_the_same_inputs() {
        let a = derive_binding_psk(b"realm", &[1u8; 32], &[2u8; 32]);
        let b = derive_binding_psk(b"realm", &[1u8; 32], &[2u8; 32]);
        assert_eq!(a, b);
    }

    #[test]
    fn binding_psk_differs_when_any_input_changes() {
        let base = derive_binding_psk(b"realm", &[1u8; 32], &[2u8; 32]);
        assert_ne!(base, derive_binding_psk(b"other-realm", &[1u8; 32], &[2u8; 32]));
        assert_ne!(base, derive_binding_psk(b"realm", &[9u8; 32], &[2u8; 32]));
        assert_ne!(base, derive_binding_psk(b"realm", &[1u8; 32], &[9u8; 32]));
    }

    #[test]
    fn card_psk_is_deterministic_and_differs_from_binding_psk() {
        let card_psk = derive_card_psk(b"realm", &[7u8; 32], &[8u8; 32], &[1u8; 32], &[2u8; 32]);
        assert_eq!(card_psk, derive_card_psk(b"realm", &[7u8; 32], &[8u8; 32], &[1u8; 32], &[2u8; 32]));

        let binding_psk = derive_binding_psk(b"realm", &[8u8; 32], &[1u8; 32]);
        assert_ne!(card_psk, binding_psk);
    }
}
