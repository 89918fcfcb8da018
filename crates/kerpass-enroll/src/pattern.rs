//! The enrollment handshake pattern: Noise `XX` extended with two trailing
//! PSK-only messages (spec.md §4.9). Standard `psk<n>` modifiers only ever
//! touch an *existing* message; here `n` names messages one and two past
//! `XX`'s last, so the pattern is registered directly from its full DSL
//! rather than built by applying `Modifier::Psk` to the base `XX` pattern.

use kerpass_error::Result;
use kerpass_noise::Pattern;

pub const XXPSK45: &str = "XXPSK45";

const DSL: &str = "-> e\n<- e, ee, s, es\n-> s, se\n<- psk\n-> psk";

/// Builds the registered `XXPSK45` pattern: `XX`'s three messages, then a
/// responder-sent message carrying only `psk` (the card-create-response
/// envelope), then an initiator-sent message carrying only `psk` (the
/// closing empty payload).
pub fn xxpsk45() -> Result<Pattern> {
    Pattern::parse(XXPSK45, DSL)
}
