//! Binary encoding for a public key crossing a wire boundary: a one-byte
//! curve discriminant followed by the raw uncompressed public-key bytes of
//! that curve (spec.md §6 "Public-key handle binary encoding").

use kerpass_crypto::Curve;
use kerpass_error::{Error, Result};

fn discriminant(curve: Curve) -> u8 {
    match curve {
        Curve::X25519 => 1,
        Curve::P256 => 2,
        Curve::P384 => 3,
        Curve::P521 => 4,
    }
}

fn curve_for_discriminant(byte: u8) -> Result<Curve> {
    match byte {
        1 => Ok(Curve::X25519),
        2 => Ok(Curve::P256),
        3 => Ok(Curve::P384),
        4 => Ok(Curve::P521),
        other => Err(Error::validation(format!("unknown curve discriminant {other}"))),
    }
}

/// Encodes `public` (already curve-validated by the caller) as a handle:
/// `[discriminant] || public`.
pub fn encode(curve: Curve, public: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + public.len());
    out.push(discriminant(curve));
    out.extend_from_slice(public);
    out
}

/// Decodes a handle into `(curve, public_key_bytes)`, validating the public
/// key is well-formed for the named curve.
pub fn decode(bytes: &[u8]) -> Result<(Curve, Vec<u8>)> {
    let (&disc, rest) = bytes
        .split_first()
        .ok_or_else(|| Error::serialization("empty public-key handle"))?;
    let curve = curve_for_discriminant(disc)?;
    if rest.len() != curve.pubkey_len() {
        return Err(Error::serialization(format!(
            "public-key handle for {:?} must carry {} bytes, got {}",
            curve,
            curve.pubkey_len(),
            rest.len()
        )));
    }
    curve.validate_pubkey(rest)?;
    Ok((curve, rest.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_x25519() {
        let kp = Curve::X25519.generate_keypair();
        let handle = encode(Curve::X25519, &kp.public);
        let (curve, public) = decode(&handle).unwrap();
        assert_eq!(curve, Curve::X25519);
        assert_eq!(public, kp.public);
    }

    #[test]
    fn round_trips_p256() {
        let kp = Curve::P256.generate_keypair();
        let handle = encode(Curve::P256, &kp.public);
        let (curve, public) = decode(&handle).unwrap();
        assert_eq!(curve, Curve::P256);
        assert_eq!(public, kp.public);
    }

    #[test]
    fn rejects_unknown_discriminant() {
        let mut handle = encode(Curve::X25519, &Curve::X25519.generate_keypair().public);
        handle[0] = 9;
        assert!(decode(&handle).is_err());
    }

    #[test]
    fn rejects_wrong_length_for_curve() {
        let handle = encode(Curve::X25519, &[0u8; 16]);
        assert!(decode(&handle).is_err());
    }
}
