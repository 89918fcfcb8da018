//! The built-in handshake patterns, pre-registered the way
//! [`kerpass_registry::Registry`] expects: constructed once, read many times
//! (spec.md §4.1, "the standard Noise pattern family").

use kerpass_error::Result;
use kerpass_registry::Registry;

use crate::pattern::Pattern;

const ONE_WAY: &[(&str, &str)] = &[
    ("N", "<- s\n...\n-> e, es"),
    ("K", "-> s\n<- s\n...\n-> e, es, ss"),
    ("X", "<- s\n...\n-> e, es, s, ss"),
];

const INTERACTIVE: &[(&str, &str)] = &[
    ("NN", "-> e\n<- e, ee"),
    ("NK", "<- s\n...\n-> e, es\n<- e, ee"),
    ("NX", "-> e\n<- e, ee, s, es"),
    ("XN", "-> e\n<- e, ee\n-> s, se"),
    ("XK", "<- s\n...\n-> e, es\n<- e, ee\n-> s, se"),
    ("XX", "-> e\n<- e, ee, s, es\n-> s, se"),
    ("IN", "-> e, s\n<- e, ee, se"),
    ("IK", "<- s\n...\n-> e, es, s, ss\n<- e, ee, se"),
    ("IX", "-> e, s\n<- e, ee, se, s, es"),
    ("KN", "-> s\n...\n-> e\n<- e, ee, se"),
    ("KK", "-> s\n<- s\n...\n-> e, es, ss\n<- e, ee, se"),
    ("KX", "-> s\n...\n-> e\n<- e, ee, se, s, es"),
];

/// Deferred variants: one DH (or static-key transmission) token is pushed
/// one message later than in its base pattern, trading an extra round trip
/// for weaker forward secrecy on that token (spec.md §4.1). These are rarer
/// in practice than the core 12 above; grounded in the Noise specification's
/// deferred-pattern construction rule rather than a single canonical source.
const DEFERRED: &[(&str, &str)] = &[
    ("XK1", "<- s\n...\n-> e\n<- e, ee, es\n-> s, se"),
    ("X1K", "<- s\n...\n-> e, es\n<- e, ee\n-> s, se"),
    ("KK1", "-> s\n<- s\n...\n-> e\n<- e, ee, se, es"),
    ("K1K", "-> s\n<- s\n...\n-> e, es\n<- e, ee\n-> se"),
    ("K1K1", "-> s\n<- s\n...\n-> e\n<- e, ee, es\n-> se"),
    ("IK1", "<- s\n...\n-> e, s\n<- e, ee, se, es"),
    ("I1K", "<- s\n...\n-> e, s, es\n<- e, ee\n-> se"),
];

/// Builds a fresh registry of every built-in pattern, keyed by name.
pub fn standard_patterns() -> Result<Registry<String, Pattern>> {
    let registry = Registry::new();
    for (name, dsl) in ONE_WAY.iter().chain(INTERACTIVE).chain(DEFERRED) {
        registry.set((*name).to_string(), Pattern::parse(*name, dsl)?)?;
    }
    Ok(registry)
}
