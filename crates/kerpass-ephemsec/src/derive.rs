//! EPHEMSEC derivation: salt/info/IKM construction, HKDF, and digit/byte
//! encoding of the resulting code (spec.md §4.6).

use kerpass_error::{Error, Result};

use crate::scheme::Scheme;

/// Base-N digit alphabets an OTP code may additionally be rendered through.
/// Each is duplicate-free (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alphabet {
    Decimal,
    Hex,
    Crockford32,
}

impl Alphabet {
    fn chars(&self) -> &'static [u8] {
        match self {
            Alphabet::Decimal => b"0123456789",
            Alphabet::Hex => b"0123456789ABCDEF",
            Alphabet::Crockford32 => b"0123456789ABCDEFGHJKMNPQRSTVWXYZ",
        }
    }

    fn base(&self) -> u32 {
        self.chars().len() as u32
    }

    fn encode_digit(&self, digit: u32) -> Result<u8> {
        self.chars()
            .get(digit as usize)
            .copied()
            .ok_or_else(|| Error::validation(format!("digit {digit} out of range for alphabet of base {}", self.base())))
    }
}

/// The derived code: a sequence of base-`B` digits (OTP mode) or raw bytes
/// (OTK mode, `B == 256`), with an optional trailing sync digit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Code {
    Otp { digits: Vec<u32>, sync_digit: Option<u32> },
    Otk { bytes: Vec<u8>, sync_byte: Option<u8> },
}

impl Code {
    /// Renders an OTP code's digits (and sync digit, if present) as ASCII
    /// characters in one of the three named alphabets.
    pub fn render(&self, alphabet: Alphabet) -> Result<String> {
        let Code::Otp { digits, sync_digit } = self else {
            return Err(Error::validation("render is only defined for OTP-mode codes"));
        };
        let mut out = String::with_capacity(digits.len() + 1);
        for d in digits {
            out.push(alphabet.encode_digit(*d)? as char);
        }
        if let Some(s) = sync_digit {
            out.push(alphabet.encode_digit(*s)? as char);
        }
        Ok(out)
    }
}

/// Inputs to one derivation (spec.md §4.6). `context` is at most 64 bytes;
/// `nonce` is 16–64 bytes.
pub struct DeriveInput<'a> {
    pub context: &'a [u8],
    pub nonce: &'a [u8],
    pub pseudo_time: u64,
    /// Concatenated DH shares, ephemeral-then-static.
    pub dh_shared: &'a [u8],
    pub psk: &'a [u8],
}

/// `Salt = 'C' || len(C) || C || 'S' || len(S) || S` (spec.md §4.6).
fn build_salt(context: &[u8], scheme_name: &str) -> Vec<u8> {
    let scheme_bytes = scheme_name.as_bytes();
    let mut salt = Vec::with_capacity(2 + context.len() + 2 + scheme_bytes.len());
    salt.push(b'C');
    salt.push(context.len() as u8);
    salt.extend_from_slice(context);
    salt.push(b'S');
    salt.push(scheme_bytes.len() as u8);
    salt.extend_from_slice(scheme_bytes);
    salt
}

/// `Info = 'N' || len(N) || N || 'T' || 8 || big-endian u64(t)` (spec.md
/// §4.6).
fn build_info(nonce: &[u8], pseudo_time: u64) -> Vec<u8> {
    let mut info = Vec::with_capacity(2 + nonce.len() + 10);
    info.push(b'N');
    info.push(nonce.len() as u8);
    info.extend_from_slice(nonce);
    info.push(b'T');
    info.push(8);
    info.extend_from_slice(&pseudo_time.to_be_bytes());
    info
}

/// Runs the full derivation described in spec.md §4.6, producing a [`Code`]
/// in whichever mode `scheme.b` selects.
pub fn derive(scheme: &Scheme, input: &DeriveInput<'_>) -> Result<Code> {
    if input.context.len() > 64 {
        return Err(Error::validation("EPHEMSEC context must be at most 64 bytes"));
    }
    if !(16..=64).contains(&input.nonce.len()) {
        return Err(Error::validation("EPHEMSEC nonce must be 16 to 64 bytes"));
    }

    let scheme_name = scheme.name();
    let salt = build_salt(input.context, &scheme_name);
    let info = build_info(input.nonce, input.pseudo_time);

    let mut ikm = Vec::with_capacity(input.dh_shared.len() + input.psk.len());
    ikm.extend_from_slice(input.dh_shared);
    ikm.extend_from_slice(input.psk);

    if scheme.is_otk() {
        let okm = scheme.hash.hkdf_expand(&salt, &ikm, &info, scheme.p as usize);
        let sync_byte = if scheme.s {
            Some((input.pseudo_time % 256) as u8)
        } else {
            None
        };
        Ok(Code::Otk { bytes: okm, sync_byte })
    } else {
        let okm = scheme.hash.hkdf_expand(&salt, &ikm, &info, 8);
        let raw = u64::from_be_bytes(okm.try_into().expect("hkdf_expand(len=8) returns exactly 8 bytes"));

        // B^P can reach or exceed 2^64 at the edge of the entropy budget
        // (e.g. B=16, P=16); when it doesn't fit in a u64 the full HKDF
        // output already covers that range, so skip the reduction.
        let mut value = match (scheme.b as u64).checked_pow(scheme.p) {
            Some(modulus) if modulus != 0 => raw % modulus,
            _ => raw,
        };

        let mut digits = vec![0u32; scheme.p as usize];
        for slot in digits.iter_mut().rev() {
            *slot = (value % scheme.b as u64) as u32;
            value /= scheme.b as u64;
        }

        let sync_digit = if scheme.s {
            Some((input.pseudo_time % scheme.b as u64) as u32)
        } else {
            None
        };
        Ok(Code::Otp { digits, sync_digit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::Scheme;

    fn sample_input() -> (Scheme, Vec<u8>, Vec<u8>) {
        let scheme = Scheme::parse("Kerpass_SHA256_25519_E1S1_T30_B10_P6_S1").unwrap();
        let dh = vec![0x42u8; 32];
        let psk = vec![0x24u8; 32];
        (scheme, dh, psk)
    }

    #[test]
    fn otp_derivation_is_deterministic() {
        let (scheme, dh, psk) = sample_input();
        let input = DeriveInput {
            context: b"ctx",
            nonce: &[1u8; 16],
            pseudo_time: 12345,
            dh_shared: &dh,
            psk: &psk,
        };
        let a = derive(&scheme, &input).unwrap();
        let b = derive(&scheme, &input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn otp_has_expected_digit_count_and_sync_digit() {
        let (scheme, dh, psk) = sample_input();
        let input = DeriveInput {
            context: b"ctx",
            nonce: &[1u8; 16],
            pseudo_time: 99,
            dh_shared: &dh,
            psk: &psk,
        };
        let code = derive(&scheme, &input).unwrap();
        match code {
            Code::Otp { digits, sync_digit } => {
                assert_eq!(digits.len(), 6);
                assert!(digits.iter().all(|d| *d < 10));
                assert_eq!(sync_digit, Some(99 % 10));
            }
            Code::Otk { .. } => panic!("expected OTP mode"),
        }
    }

    #[test]
    fn otk_mode_returns_raw_bytes_of_requested_length() {
        let scheme = Scheme::parse("Kerpass_SHA256_25519_E1S2_T60_B256_P32_S1").unwrap();
        let input = DeriveInput {
            context: b"ctx",
            nonce: &[2u8; 24],
            pseudo_time: 500,
            dh_shared: &[0x11; 64],
            psk: &[0x22; 32],
        };
        let code = derive(&scheme, &input).unwrap();
        match code {
            Code::Otk { bytes, sync_byte } => {
                assert_eq!(bytes.len(), 32);
                assert_eq!(sync_byte, Some((500 % 256) as u8));
            }
            Code::Otp { .. } => panic!("expected OTK mode"),
        }
    }

    #[test]
    fn different_context_changes_the_code() {
        let (scheme, dh, psk) = sample_input();
        let base = DeriveInput {
            context: b"ctx-a",
            nonce: &[1u8; 16],
            pseudo_time: 1,
            dh_shared: &dh,
            psk: &psk,
        };
        let other = DeriveInput {
            context: b"ctx-b",
            ..base
        };
        assert_ne!(derive(&scheme, &base).unwrap(), derive(&scheme, &other).unwrap());
    }

    #[test]
    fn render_uses_requested_alphabet() {
        let (scheme, dh, psk) = sample_input();
        let input = DeriveInput {
            context: b"ctx",
            nonce: &[1u8; 16],
            pseudo_time: 7,
            dh_shared: &dh,
            psk: &psk,
        };
        let code = derive(&scheme, &input).unwrap();
        let text = code.render(Alphabet::Decimal).unwrap();
        assert_eq!(text.len(), 7);
        assert!(text.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn rejects_oversized_context() {
        let (scheme, dh, psk) = sample_input();
        let ctx = vec![0u8; 65];
        let input = DeriveInput {
            context: &ctx,
            nonce: &[1u8; 16],
            pseudo_time: 1,
            dh_shared: &dh,
            psk: &psk,
        };
        assert!(derive(&scheme, &input).is_err());
    }

    #[test]
    fn rejects_short_nonce() {
        let (scheme, dh, psk) = sample_input();
        let input = DeriveInput {
            context: b"ctx",
            nonce: &[1u8; 8],
            pseudo_time: 1,
            dh_shared: &dh,
            psk: &psk,
        };
        assert!(derive(&scheme, &input).is_err());
    }
}
