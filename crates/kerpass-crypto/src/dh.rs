//! The DH suite: X25519 and NIST P-256/384/521, each with fixed-length
//! key/secret sizes (spec.md §2, §3 "SymmetricState"/"HandshakeState").

use elliptic_curve::ecdh::diffie_hellman as nist_diffie_hellman;
use elliptic_curve::sec1::ToEncodedPoint;
use kerpass_error::{Error, Result};
use rand_core::OsRng;

/// A closed set of supported curves (spec.md §9: a small variant set, not an
/// open-ended trait-object zoo).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    X25519,
    P256,
    P384,
    P521,
}

/// A generated (or reconstructed) private/public key pair for a [`Curve`].
#[derive(Clone)]
pub struct KeyPair {
    pub curve: Curve,
    pub private: Vec<u8>,
    pub public: Vec<u8>,
}

impl Curve {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "25519" => Ok(Self::X25519),
            "P256" => Ok(Self::P256),
            "P384" => Ok(Self::P384),
            "P521" => Ok(Self::P521),
            other => Err(Error::validation(format!("unknown curve {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::X25519 => "25519",
            Self::P256 => "P256",
            Self::P384 => "P384",
            Self::P521 => "P521",
        }
    }

    /// Length in bytes of the wire-encoded public key (uncompressed SEC1
    /// point for the NIST curves, raw Montgomery u-coordinate for X25519).
    pub fn pubkey_len(&self) -> usize {
        match self {
            Self::X25519 => 32,
            Self::P256 => 65,
            Self::P384 => 97,
            Self::P521 => 133,
        }
    }

    /// Length in bytes of the private scalar.
    pub fn privkey_len(&self) -> usize {
        match self {
            Self::X25519 => 32,
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Length in bytes of the DH shared secret.
    pub fn dh_len(&self) -> usize {
        match self {
            Self::X25519 => 32,
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub fn generate_keypair(&self) -> KeyPair {
        match self {
            Self::X25519 => {
                let sk = x25519_dalek::StaticSecret::random_from_rng(OsRng);
                let pk = x25519_dalek::PublicKey::from(&sk);
                KeyPair {
                    curve: *self,
                    private: sk.to_bytes().to_vec(),
                    public: pk.as_bytes().to_vec(),
                }
            }
            Self::P256 => {
                let sk = p256::SecretKey::random(&mut OsRng);
                let public = sk.public_key().to_encoded_point(false).as_bytes().to_vec();
                KeyPair {
                    curve: *self,
                    private: sk.to_bytes().to_vec(),
                    public,
                }
            }
            Self::P384 => {
                let sk = p384::SecretKey::random(&mut OsRng);
                let public = sk.public_key().to_encoded_point(false).as_bytes().to_vec();
                KeyPair {
                    curve: *self,
                    private: sk.to_bytes().to_vec(),
                    public,
                }
            }
            Self::P521 => {
                let sk = p521::SecretKey::random(&mut OsRng);
                let public = sk.public_key().to_encoded_point(false).as_bytes().to_vec();
                KeyPair {
                    curve: *self,
                    private: sk.to_bytes().to_vec(),
                    public,
                }
            }
        }
    }

    pub fn pubkey_from_private(&self, private: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::X25519 => {
                let arr: [u8; 32] = private
                    .try_into()
                    .map_err(|_| Error::validation("X25519 private key must be 32 bytes"))?;
                let sk = x25519_dalek::StaticSecret::from(arr);
                Ok(x25519_dalek::PublicKey::from(&sk).as_bytes().to_vec())
            }
            Self::P256 => {
                let sk = p256::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P256 private key"))?;
                Ok(sk.public_key().to_encoded_point(false).as_bytes().to_vec())
            }
            Self::P384 => {
                let sk = p384::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P384 private key"))?;
                Ok(sk.public_key().to_encoded_point(false).as_bytes().to_vec())
            }
            Self::P521 => {
                let sk = p521::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P521 private key"))?;
                Ok(sk.public_key().to_encoded_point(false).as_bytes().to_vec())
            }
        }
    }

    /// Validates that `bytes` is a well-formed public key on this curve
    /// (on-curve check for the NIST curves; length check for X25519).
    pub fn validate_pubkey(&self, bytes: &[u8]) -> Result<()> {
        match self {
            Self::X25519 => {
                if bytes.len() == 32 {
                    Ok(())
                } else {
                    Err(Error::validation("X25519 public key must be 32 bytes"))
                }
            }
            Self::P256 => p256::PublicKey::from_sec1_bytes(bytes)
                .map(|_| ())
                .map_err(|_| Error::validation("invalid P256 public key")),
            Self::P384 => p384::PublicKey::from_sec1_bytes(bytes)
                .map(|_| ())
                .map_err(|_| Error::validation("invalid P384 public key")),
            Self::P521 => p521::PublicKey::from_sec1_bytes(bytes)
                .map(|_| ())
                .map_err(|_| Error::validation("invalid P521 public key")),
        }
    }

    /// `DH(private, public)`: the raw shared secret, `dh_len()` bytes.
    pub fn dh(&self, private: &[u8], public: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::X25519 => {
                let priv_arr: [u8; 32] = private
                    .try_into()
                    .map_err(|_| Error::validation("X25519 private key must be 32 bytes"))?;
                let pub_arr: [u8; 32] = public
                    .try_into()
                    .map_err(|_| Error::validation("X25519 public key must be 32 bytes"))?;
                let sk = x25519_dalek::StaticSecret::from(priv_arr);
                let pk = x25519_dalek::PublicKey::from(pub_arr);
                Ok(sk.diffie_hellman(&pk).to_bytes().to_vec())
            }
            Self::P256 => {
                let sk = p256::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P256 private key"))?;
                let pk = p256::PublicKey::from_sec1_bytes(public)
                    .map_err(|_| Error::validation("invalid P256 public key"))?;
                let shared = nist_diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
            Self::P384 => {
                let sk = p384::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P384 private key"))?;
                let pk = p384::PublicKey::from_sec1_bytes(public)
                    .map_err(|_| Error::validation("invalid P384 public key"))?;
                let shared = nist_diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
            Self::P521 => {
                let sk = p521::SecretKey::from_slice(private)
                    .map_err(|_| Error::validation("invalid P521 private key"))?;
                let pk = p521::PublicKey::from_sec1_bytes(public)
                    .map_err(|_| Error::validation("invalid P521 public key"))?;
                let shared = nist_diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}
