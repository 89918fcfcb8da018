//! CBOR wire messages with integer keys for the challenge factory's
//! request/response pair and the agent-facing auth context (spec.md §6
//! "Wire messages"). Hand-encoded against [`ciborium::Value`] for the same
//! reason as `kerpass-enroll`'s wire module: the wire format calls for
//! small integer keys, not `serde_derive`'s field-name strings.

use ciborium::value::Value;
use kerpass_error::{Error, Result};
use kerpass_session::SESSION_ID_LEN;

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

fn require_int(map: &[(Value, Value)], key: i64, field: &str) -> Result<i128> {
    map_get(map, key)
        .and_then(Value::as_integer)
        .map(i128::from)
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

fn session_id_bytes(map: &[(Value, Value)], key: i64) -> Result<[u8; SESSION_ID_LEN]> {
    let raw = require_bytes(map, key, "session_id")?;
    raw.as_slice()
        .try_into()
        .map_err(|_| Error::serialization(format!("session_id must be {SESSION_ID_LEN} bytes")))
}

/// `{1: realm_id, 2: auth_method, 3: app_context_url}` (spec.md §6). Also
/// the wire shape for `AppAuthRequest` (spec.md §2 "SLP envelope"; see
/// [`crate::slp`]).
pub struct CardChallengeRequest {
    pub realm_id: Vec<u8>,
    pub auth_method: u32,
    pub app_context_url: String,
}

impl CardChallengeRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(vec![
            (int(1), Value::Bytes(self.realm_id.clone())),
            (int(2), Value::Integer((self.auth_method as i64).into())),
            (int(3), Value::Text(self.app_context_url.clone())),
        ])
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        let realm_id = require_bytes(&map, 1, "realm_id")?;
        let auth_method = require_int(&map, 2, "auth_method")?;
        let auth_method: u32 = auth_method
            .try_into()
            .map_err(|_| Error::validation("auth_method must fit in 32 bits"))?;
        let app_context_url = require_text(&map, 3, "app_context_url")?;
        Ok(CardChallengeRequest {
            realm_id,
            auth_method,
            app_context_url,
        })
    }
}

/// `{1: session_id, 2: ephemeral public key, 3: nonce, 4: static public key
/// (optional), 5: certificate (optional), 6: login_url, 7: app_start_url}`
/// (spec.md §6).
pub struct CardChallenge {
    pub session_id: [u8; SESSION_ID_LEN],
    pub ephemeral_public_key: Vec<u8>,
    pub nonce: Vec<u8>,
    pub static_public_key: Option<Vec<u8>>,
    pub certificate: Option<Vec<u8>>,
    pub login_url: String,
    pub app_start_url: String,
}

impl CardChallenge {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut map = vec![
            (int(1), Value::Bytes(self.session_id.to_vec())),
            (int(2), Value::Bytes(self.ephemeral_public_key.clone())),
            (int(3), Value::Bytes(self.nonce.clone())),
        ];
        if let Some(spk) = &self.static_public_key {
            map.push((int(4), Value::Bytes(spk.clone())));
        }
        if let Some(cert) = &self.certificate {
            map.push((int(5), Value::Bytes(cert.clone())));
        }
        map.push((int(6), Value::Text(self.login_url.clone())));
        map.push((int(7), Value::Text(self.app_start_url.clone())));
        encode(map)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        Ok(CardChallenge {
            session_id: session_id_bytes(&map, 1)?,
            ephemeral_public_key: require_bytes(&map, 2, "ephemeral_public_key")?,
            nonce: require_bytes(&map, 3, "nonce")?,
            static_public_key: optional_bytes(&map, 4),
            certificate: optional_bytes(&map, 5),
            login_url: require_text(&map, 6, "login_url")?,
            app_start_url: require_text(&map, 7, "app_start_url")?,
        })
    }
}

/// `{1: selected_protocol, 2: session_id, 3: static_cert (optional), 4..7:
/// URLs}` (spec.md §6). The four URL slots mirror the configured
/// [`crate::factory::AuthContext`]'s own four URLs, in the same order:
/// `app_context_url`, `auth_server_get_challenge_url`,
/// `auth_server_login_url`, `app_start_url`.
pub struct AgentAuthContext {
    pub selected_protocol: u8,
    pub session_id: [u8; SESSION_ID_LEN],
    pub static_cert: Option<Vec<u8>>,
    pub app_context_url: String,
    pub auth_server_get_challenge_url: String,
    pub auth_server_login_url: String,
    pub app_start_url: String,
}

impl AgentAuthContext {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut map = vec![
            (int(1), Value::Integer((self.selected_protocol as i64).into())),
            (int(2), Value::Bytes(self.session_id.to_vec())),
        ];
        if let Some(cert) = &self.static_cert {
            map.push((int(3), Value::Bytes(cert.clone())));
        }
        map.push((int(4), Value::Text(self.app_context_url.clone())));
        map.push((int(5), Value::Text(self.auth_server_get_challenge_url.clone())));
        map.push((int(6), Value::Text(self.auth_server_login_url.clone())));
        map.push((int(7), Value::Text(self.app_start_url.clone())));
        encode(map)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map = decode(bytes)?;
        let selected_protocol = require_int(&map, 1, "selected_protocol")?;
        let selected_protocol: u8 = selected_protocol
            .try_into()
            .map_err(|_| Error::validation("selected_protocol must fit in one byte"))?;
        Ok(AgentAuthContext {
            selected_protocol,
            session_id: session_id_bytes(&map, 2)?,
            static_cert: optional_bytes(&map, 3),
            app_context_url: require_text(&map, 4, "app_context_url")?,
            auth_server_get_challenge_url: require_text(&map, 5, "auth_server_get_challenge_url")?,
            auth_server_login_url: require_text(&map, 6, "auth_server_login_url")?,
            app_start_url: require_text(&map, 7, "app_start_url")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_challenge_request_roundtrips() {
        let req = CardChallengeRequest {
            realm_id: vec![1u8; 32],
            auth_method: 0x1_0002,
            app_context_url: "https://app.example/ctx".to_string(),
        };
        let bytes = req.to_bytes().unwrap();
        let decoded = CardChallengeRequest::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.realm_id, req.realm_id);
        assert_eq!(decoded.auth_method, req.auth_method);
        assert_eq!(decoded.app_context_url, req.app_context_url);
    }

    #[test]
    fn card_challenge_roundtrips_with_optional_fields_absent() {
        let challenge = CardChallenge {
            session_id: [7u8; SESSION_ID_LEN],
            ephemeral_public_key: vec![1u8; 32],
            nonce: vec![2u8; 32],
            static_public_key: None,
            certificate: None,
            login_url: "https://login.example".to_string(),
            app_start_url: "https://app.example/start".to_string(),
        };
        let bytes = challenge.to_bytes().unwrap();
        let decoded = CardChallenge::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.session_id, challenge.session_id);
        assert!(decoded.static_public_key.is_none());
        assert!(decoded.certificate.is_none());
    }

    #[test]
    fn card_challenge_roundtrips_with_optional_fields_present() {
        let challenge = CardChallenge {
            session_id: [3u8; SESSION_ID_LEN],
            ephemeral_public_key: vec![1u8; 65],
            nonce: vec![2u8; 32],
            static_public_key: Some(vec![4u8; 65]),
            certificate: Some(vec![5u8; 10]),
            login_url: "https://login.example".to_string(),
            app_start_url: "https://app.example/start".to_string(),
        };
        let bytes = challenge.to_bytes().unwrap();
        let decoded = CardChallenge::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.static_public_key, challenge.static_public_key);
        assert_eq!(decoded.certificate, challenge.certificate);
    }

    #[test]
    fn agent_auth_context_roundtrips() {
        let ctx = AgentAuthContext {
            selected_protocol: 1,
            session_id: [9u8; SESSION_ID_LEN],
            static_cert: Some(vec![6u8; 4]),
            app_context_url: "https://app".to_string(),
            auth_server_get_challenge_url: "https://auth/challenge".to_string(),
            auth_server_login_url: "https://auth/login".to_string(),
            app_start_url: "https://app/start".to_string(),
        };
        let bytes = ctx.to_bytes().unwrap();
        let decoded = AgentAuthContext::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.selected_protocol, 1);
        assert_eq!(decoded.static_cert, ctx.static_cert);
        assert_eq!(decoded.auth_server_login_url, ctx.auth_server_login_url);
    }

    #[test]
    fn malformed_session_id_length_is_rejected() {
        let map = vec![
            (int(1), Value::Integer(1i64.into())),
            (int(2), Value::Bytes(vec![1u8; 10])),
        ];
        let bytes = encode(map).unwrap();
        assert!(AgentAuthContext::from_bytes(&bytes).is_err());
    }
}
