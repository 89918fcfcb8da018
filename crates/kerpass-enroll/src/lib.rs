//! The enrollment protocol: persisted records, in-memory credential/key
//! stores, the `XXPSK45` Noise-XX-with-two-trailing-PSKs handshake pattern,
//! PSK derivation, the PKI validation seam, wire messages, and the
//! client/server state-function chains that drive enrollment to completion
//! (spec.md §4.9).

pub mod pattern;
pub mod pki;
pub mod protocol;
pub mod psk;
pub mod records;
pub mod store;
pub mod wire;

pub use pattern::{xxpsk45, XXPSK45};
pub use protocol::{enroll_client, enroll_server};
pub use records::{Card, EnrollAuthorization, ServerCard, ServerKey};
pub use store::{MemClientCredStore, MemKeyStore, MemServerCredStore};
