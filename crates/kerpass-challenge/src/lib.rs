//! The challenge factory, its `AuthMethod`/public-key-handle wire
//! encodings, and SLP envelope validation (spec.md §4.10, §6).

pub mod auth_method;
pub mod context;
pub mod factory;
pub mod pubkey;
pub mod slp;
pub mod wire;

pub use auth_method::{AuthMethod, Protocol};
pub use context::{agent_context_hash, ephemsec_context_hash};
pub use factory::{AuthContext, CardChallenge, ChallengeFactory, RealmStaticKeyStore};
