//! EPHEMSEC: the ephemeral-secret scheme grammar, pseudo-time windowing, and
//! HKDF-based OTP/OTK derivation (spec.md §4.5–§4.6).

pub mod derive;
pub mod scheme;

pub use derive::{derive, Alphabet, Code, DeriveInput};
pub use scheme::{Kx, Scheme};
