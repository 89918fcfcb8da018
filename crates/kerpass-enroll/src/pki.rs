//! Realm certificate validation. The enrollment protocol hands this a
//! realm's certificate bytes right after the server's first handshake
//! message; this crate's only contract with it is "fail enrollment if it
//! returns an error".
//!
//! The certificate-chain validator itself (trust anchors, revocation,
//! expiry) is out of this crate's scope and is a stub here, matching the
//! source this protocol was modeled on.

use kerpass_error::{Error, Result};

/// TODO: check `cert` against the realm's configured trust anchor once a
/// PKI validator is wired in. Until then this matches the source's own
/// `pkiCheck` stub exactly: accept iff both the server's static public key
/// and its certificate are non-empty (spec.md §9).
pub fn validate_certificate(public_key: &[u8], cert: &[u8]) -> Result<()> {
    if public_key.is_empty() || cert.is_empty() {
        return Err(Error::authentication(
            "certificate validation stub rejected an empty public key or certificate",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_non_empty_key_and_cert() {
        assert!(validate_certificate(&[1, 2, 3], &[4, 5, 6]).is_ok());
    }

    #[test]
    fn rejects_empty_public_key() {
        assert!(validate_certificate(&[], &[4, 5, 6]).is_err());
    }

    #[test]
    fn rejects_empty_cert() {
        assert!(validate_certificate(&[1, 2, 3], &[]).is_err());
    }
}
