//! S1 (EPHEMSEC OTP round-trip, spec.md §8): an initiator a little behind
//! the verifier's reference time derives the same OTP once the verifier
//! searches its neighboring pseudo-time windows via `SyncTime`.

use kerpass_ephemsec::{derive, Alphabet, DeriveInput, Scheme};

const REFERENCE_UNIX_SECONDS: u64 = 1_730_000_000;
const INITIATOR_SKEW_SECONDS: u64 = 50;

#[test]
fn initiator_and_verifier_derive_the_same_otp_across_a_small_clock_skew() {
    let scheme = Scheme::parse("Kerpass_SHA256_25519_E1S1_T400_B32_P8_S1").unwrap();
    let dh_shared = [0x03u8; 32];
    let psk = [0x01u8; 32];
    let nonce = [0x02u8; 16];

    let initiator_unix_seconds = REFERENCE_UNIX_SECONDS - INITIATOR_SKEW_SECONDS;
    let (initiator_pseudo_time, sync_hint) = scheme.time(initiator_unix_seconds);

    let initiator_code = derive(
        &scheme,
        &DeriveInput {
            context: b"",
            nonce: &nonce,
            pseudo_time: initiator_pseudo_time,
            dh_shared: &dh_shared,
            psk: &psk,
        },
    )
    .unwrap();

    let verifier_pseudo_time = scheme.sync_time(REFERENCE_UNIX_SECONDS, sync_hint);
    let verifier_code = derive(
        &scheme,
        &DeriveInput {
            context: b"",
            nonce: &nonce,
            pseudo_time: verifier_pseudo_time,
            dh_shared: &dh_shared,
            psk: &psk,
        },
    )
    .unwrap();

    assert_eq!(initiator_code, verifier_code);

    let rendered = initiator_code.render(Alphabet::Crockford32).unwrap();
    assert_eq!(rendered.len(), 9, "8 OTP digits plus 1 sync digit");
}
