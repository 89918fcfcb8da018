//! A from-scratch Noise Protocol Framework core: the handshake pattern DSL,
//! `SymmetricState`/`HandshakeState`, and the post-handshake transport
//! cipher (spec.md §4.1–§4.4).

pub mod handshake;
pub mod pattern;
pub mod registry;
pub mod symmetric;
pub mod transport;

pub use handshake::{Config, HandshakeKeys, HandshakeState};
pub use pattern::{Direction, MessagePattern, Modifier, Pattern, Role, Token};
pub use registry::standard_patterns;
pub use transport::{CipherState, TransportKeys, MAX_MESSAGE_LEN};
