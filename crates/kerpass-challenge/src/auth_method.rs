//! The `AuthMethod` integer encoding: a 32-bit value whose low 18 bits carry
//! `(protocol << 16) | scheme_id` (spec.md §6 "AuthMethod integer
//! encoding").
//!
//! `scheme_id` names one of the configured [`kerpass_ephemsec::Scheme`]s
//! indirectly, as a 16-bit index rather than the scheme's full name string,
//! since the encoding has no room for a variable-length name. Callers
//! resolve it against whatever table they configured their
//! [`crate::factory::AuthContext`] list from (see `DESIGN.md`).

use kerpass_ephemsec::Scheme;
use kerpass_error::{Error, Result};

/// The three SLP sub-protocols an `AuthMethod` selects between (spec.md
/// §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    SlpDirect,
    SlpCpace,
    SlpNxPsk2,
}

impl Protocol {
    fn code(self) -> u32 {
        match self {
            Protocol::SlpDirect => 0,
            Protocol::SlpCpace => 1,
            Protocol::SlpNxPsk2 => 2,
        }
    }

    pub(crate) fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Protocol::SlpDirect),
            1 => Ok(Protocol::SlpCpace),
            2 => Ok(Protocol::SlpNxPsk2),
            other => Err(Error::validation(format!("unknown SLP protocol code {other}"))),
        }
    }

    /// Checks the protocol/scheme compatibility constraints (spec.md §6):
    /// `SlpCpace` needs an OTP scheme (`B != 256`); `SlpNxPsk2` needs an OTK
    /// scheme (`B == 256` and `P >= 33`).
    pub fn validate_scheme(self, scheme: &Scheme) -> Result<()> {
        match self {
            Protocol::SlpDirect => Ok(()),
            Protocol::SlpCpace => {
                if scheme.is_otk() {
                    Err(Error::validation("SlpCpace requires an OTP scheme (B != 256)"))
                } else {
                    Ok(())
                }
            }
            Protocol::SlpNxPsk2 => {
                if scheme.is_otk() && scheme.p >= 33 {
                    Ok(())
                } else {
                    Err(Error::validation(
                        "SlpNxPsk2 requires an OTK scheme with B = 256 and P >= 33",
                    ))
                }
            }
        }
    }
}

/// A parsed `(protocol, scheme_id)` pair (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthMethod {
    pub protocol: Protocol,
    pub scheme_id: u16,
}

const SCHEME_MASK: u32 = 0xFFFF;

impl AuthMethod {
    /// Builds an `AuthMethod`, checking `scheme`'s compatibility with
    /// `protocol` before packing the 18-bit encoding.
    pub fn new(protocol: Protocol, scheme_id: u16, scheme: &Scheme) -> Result<Self> {
        protocol.validate_scheme(scheme)?;
        Ok(AuthMethod { protocol, scheme_id })
    }

    pub fn encode(self) -> u32 {
        (self.protocol.code() << 16) | (self.scheme_id as u32 & SCHEME_MASK)
    }

    pub fn decode(value: u32) -> Result<Self> {
        if value > 0x3_FFFF {
            return Err(Error::validation("AuthMethod value exceeds its 18-bit field"));
        }
        let scheme_id = (value & SCHEME_MASK) as u16;
        let protocol = Protocol::from_code(value >> 16)?;
        Ok(AuthMethod { protocol, scheme_id })
    }
}

impl PartialEq<u32> for AuthMethod {
    fn eq(&self, other: &u32) -> bool {
        self.encode() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn otp_scheme() -> Scheme {
        Scheme::parse("Kerpass_SHA256_25519_E1S1_T30_B10_P6_S1").unwrap()
    }

    fn otk_scheme(p: u32) -> Scheme {
        Scheme::parse(&format!("Kerpass_SHA256_25519_E1S2_T30_B256_P{p}_S0")).unwrap()
    }

    #[test]
    fn encode_decode_round_trips() {
        let method = AuthMethod::new(Protocol::SlpDirect, 42, &otp_scheme()).unwrap();
        let encoded = method.encode();
        assert_eq!(AuthMethod::decode(encoded).unwrap(), method);
    }

    #[test]
    fn cpace_rejects_otk_scheme() {
        assert!(AuthMethod::new(Protocol::SlpCpace, 1, &otk_scheme(40)).is_err());
    }

    #[test]
    fn cpace_accepts_otp_scheme() {
        assert!(AuthMethod::new(Protocol::SlpCpace, 1, &otp_scheme()).is_ok());
    }

    #[test]
    fn nxpsk2_requires_otk_with_large_enough_p() {
        assert!(AuthMethod::new(Protocol::SlpNxPsk2, 1, &otk_scheme(32)).is_err());
        assert!(AuthMethod::new(Protocol::SlpNxPsk2, 1, &otk_scheme(33)).is_ok());
        assert!(AuthMethod::new(Protocol::SlpNxPsk2, 1, &otp_scheme()).is_err());
    }

    #[test]
    fn decode_rejects_oversized_value() {
        assert!(AuthMethod::decode(1 << 18).is_err());
    }

    #[test]
    fn decode_rejects_unknown_protocol_code() {
        let bogus = (3u32 << 16) | 7;
        assert!(AuthMethod::decode(bogus).is_err());
    }
}
