//! CBOR wire messages with integer keys (spec.md §6 "Wire messages"). These
//! are hand-encoded against [`ciborium::Value`] rather than derived through
//! `serde`, since `serde_derive`'s struct support emits field-name string
//! keys and the wire format calls for small integers.

use ciborium::value::Value;
use kerpass_error::{Error, Result};

fn map_get(map: &[(Value, Value)], key: i64) -> Option<&Value> {
    map.iter().find(|(k, _)| k == &Value::Integer(key.into())).map(|(_, v)| v)
}

fn require_bytes(map: &[(Value, Value)], key: i64, field: &str) -> Result<Vec<u8>> {
    map_get(map, key)
        .and_then(Value::as_bytes)
        .cloned()
        .ok_or_else(|| Error::serialization(format!("missing or malformed field {field:?}")))
}

fn optional_bytes(map: &[(Value, Value)], key: i64) -> Option<Vec<u8>> {
    map_get(map, key).and_then(Value::as_bytes).cloned()
}

fn require_text(map: &[(Value, Value)], key: i64, field: &str) -> Result<String> {
    map_get(map, key)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| Error::serialization(format!("missing or malformed field {field:?}")))
}

fn encode(map: Vec<(Value, Value)>) -> Result<Vec<u8>> {
    let value = Value::Map(map);
    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf).map_err(|e| Error::serialization(format!("CBOR encode failed: {e}")))?;
    Ok(buf)
}

fn decode(bytes: &[u8]) -> Result<Vec<(Value, Value)>> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| Error::serialization(format!("CBOR decode failed: {e}")))?;
    match value {
        Value::Map(map) => Ok(map),
        _ => Err(Error::serialization("expected a CBOR map at the top level")),
    }
}

fn int(key: i64) -> Value {
    Value::Integer(key.into())
}

/// The client's first message: the plaintext realm id alongside the first
/// Noise handshake message (`-> e`), so the server knows which static key to
/// load before it can process any encrypted bytes.
pub struct EnrollReq {
    pub realm_id: Vec<u8>,
    pub noise_message: Vec<u8>,
}

impl EnrollReq {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(vec![
            (int(1), Value::Bytes(self.realm_id.clone())),
            (int(2), Value::Bytes(self.noise_message.clone())),
        ])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        let realm_id = require_bytes(&map, 1, "realm_id")?;
        if !(32..=64).contains(&realm_id.len()) {
            return Err(Error::validation("realm_id must be 32 to 64 bytes"));
        }
        let noise_message = require_bytes(&map, 2, "noise_message")?;
        if noise_message.len() < 32 {
            return Err(Error::validation("noise_message must be at least 32 bytes"));
        }
        Ok(EnrollReq { realm_id, noise_message })
    }
}

/// The payload of the client's second handshake message: the one-time
/// authorization token and the client's share of the to-be-derived PSK's
/// inputs. Distinct from [`crate::records::EnrollAuthorization`], the
/// persisted server-side record this message is checked against.
pub struct EnrollAuthorizationMsg {
    pub authorization_id: [u8; 32],
    pub client_psk_share: Vec<u8>,
}

impl EnrollAuthorizationMsg {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(vec![
            (int(1), Value::Bytes(self.authorization_id.to_vec())),
            (int(2), Value::Bytes(self.client_psk_share.clone())),
        ])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        let authorization_id = require_bytes(&map, 1, "authorization_id")?;
        if authorization_id.len() < 32 {
            return Err(Error::validation("authorization_id must be at least 32 bytes"));
        }
        let client_psk_share = require_bytes(&map, 2, "client_psk_share")?;
        if client_psk_share.len() < 32 {
            return Err(Error::validation("client_psk_share must be at least 32 bytes"));
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&authorization_id[..32]);
        Ok(EnrollAuthorizationMsg {
            authorization_id: id,
            client_psk_share,
        })
    }
}

/// The server's response minting a new card.
pub struct EnrollCardCreateResp {
    pub card_id: [u8; 32],
    pub server_psk_share: Vec<u8>,
    pub app_name: String,
    pub app_logo: Vec<u8>,
}

impl EnrollCardCreateResp {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(vec![
            (int(1), Value::Bytes(self.card_id.to_vec())),
            (int(2), Value::Bytes(self.server_psk_share.clone())),
            (int(3), Value::Text(self.app_name.clone())),
            (int(4), Value::Bytes(self.app_logo.clone())),
        ])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        let card_id = require_bytes(&map, 1, "card_id")?;
        if card_id.len() < 32 {
            return Err(Error::validation("card_id must be at least 32 bytes"));
        }
        let server_psk_share = require_bytes(&map, 2, "server_psk_share")?;
        if server_psk_share.len() < 32 {
            return Err(Error::validation("server_psk_share must be at least 32 bytes"));
        }
        let app_name = require_text(&map, 3, "app_name")?;
        let app_logo = optional_bytes(&map, 4).unwrap_or_default();
        let mut id = [0u8; 32];
        id.copy_from_slice(&card_id[..32]);
        Ok(EnrollCardCreateResp {
            card_id: id,
            server_psk_share,
            app_name,
            app_logo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enroll_req_roundtrips() {
        let req = EnrollReq {
            realm_id: vec![7u8; 32],
            noise_message: vec![1u8; 32],
        };
        let bytes = req.to_bytes().unwrap();
        let decoded = EnrollReq::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.realm_id, req.realm_id);
        assert_eq!(decoded.noise_message, req.noise_message);
    }

    #[test]
    fn enroll_req_rejects_short_realm_id() {
        let bytes = EnrollReq {
            realm_id: vec![1u8; 10],
            noise_message: vec![1u8; 32],
        }
        .to_bytes()
        .unwrap();
        assert!(EnrollReq::from_bytes(&bytes).is_err());
    }

    #[test]
    fn enroll_authorization_msg_roundtrips() {
        let msg = EnrollAuthorizationMsg {
            authorization_id: [3u8; 32],
            client_psk_share: vec![4u8; 32],
        };
        let bytes = msg.to_bytes().unwrap();
        let decoded = EnrollAuthorizationMsg::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.authorization_id, msg.authorization_id);
        assert_eq!(decoded.client_psk_share, msg.client_psk_share);
    }

    #[test]
    fn enroll_card_create_resp_roundtrips_with_optional_logo_absent() {
        let resp = EnrollCardCreateResp {
            card_id: [5u8; 32],
            server_psk_share: vec![6u8; 32],
            app_name: "Acme".to_string(),
            app_logo: Vec::new(),
        };
        let bytes = resp.to_bytes().unwrap();
        let decoded = EnrollCardCreateResp::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.card_id, resp.card_id);
        assert_eq!(decoded.app_name, "Acme");
        assert!(decoded.app_logo.is_empty());
    }

    #[test]
    fn malformed_cbor_is_a_serialization_error() {
        let err = EnrollReq::from_bytes(&[0xff, 0x00]).unwrap_err();
        assert!(err.is_serialization() || err.is_validation());
    }
}
