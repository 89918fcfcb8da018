//! The challenge factory: binds `(realm, auth_method, app_context_url)` to
//! an ephemeral key, a session id, and a set of URLs the agent follows to
//! run the authentication challenge (spec.md §4.10).

use kerpass_crypto::{Curve, HashAlgorithm};
use kerpass_error::{Error, Result};
use kerpass_ephemsec::Scheme;
use kerpass_session::{SessionId, SessionIdFactory};
use std::time::Instant;

use crate::auth_method::AuthMethod;

/// One configured realm/method/app binding (spec.md §4.10): "a configured
/// list of AuthContext entries (each being a `(realm, auth-method,
/// app-context-url, auth-server-get-challenge-url, auth-server-login-url,
/// app-start-url)`)".
#[derive(Clone)]
pub struct AuthContext {
    pub realm_id: Vec<u8>,
    pub auth_method: AuthMethod,
    pub app_context_url: String,
    pub auth_server_get_challenge_url: String,
    pub auth_server_login_url: String,
    pub app_start_url: String,
    pub scheme: Scheme,
}

/// What [`ChallengeFactory::get_card_challenge`] returns (spec.md §4.10
/// point 1): the domain-level shape `crate::wire::CardChallenge` is encoded
/// from.
pub struct CardChallenge {
    pub session_id: SessionId,
    pub ephemeral_private_key: Vec<u8>,
    pub ephemeral_public_key: Vec<u8>,
    pub nonce: [u8; 32],
    pub static_public_key: Option<Vec<u8>>,
    pub certificate: Option<Vec<u8>>,
    pub login_url: String,
    pub app_start_url: String,
}

/// What [`ChallengeFactory::get_agent_auth_context`] returns (spec.md
/// §4.10 point 2).
pub struct AgentAuthContext {
    pub auth_method: AuthMethod,
    pub static_cert: Option<Vec<u8>>,
    pub app_context_url: String,
    pub auth_server_get_challenge_url: String,
    pub auth_server_login_url: String,
    pub app_start_url: String,
}

/// A realm's static identity as the challenge factory needs it: just the
/// public key and certificate, independent of whoever issued them (spec.md
/// §4.10: "load the realm's static public key and certificate from the key
/// store"). Implemented by whatever realm key store the embedding
/// application already runs (e.g. the same store `kerpass-enroll`'s
/// `MemKeyStore` backs) — see `DESIGN.md`.
pub trait RealmStaticKeyStore: Send + Sync {
    fn get(&self, realm_id: &[u8]) -> Option<(Vec<u8>, Vec<u8>)>;
}

/// Binds configured [`AuthContext`]s to fresh challenges and resolves
/// issued session ids back to their originating context (spec.md §4.10).
pub struct ChallengeFactory<K> {
    configs: Vec<AuthContext>,
    sessions: SessionIdFactory,
    keys: K,
}

impl<K: RealmStaticKeyStore> ChallengeFactory<K> {
    pub fn new(configs: Vec<AuthContext>, sessions: SessionIdFactory, keys: K) -> Self {
        ChallengeFactory { configs, sessions, keys }
    }

    fn find_config(&self, realm_id: &[u8], auth_method: AuthMethod, app_context_url: &str) -> Result<usize> {
        self.configs
            .iter()
            .position(|c| {
                c.realm_id == realm_id && c.auth_method == auth_method && c.app_context_url == app_context_url
            })
            .ok_or_else(|| Error::policy("no configured auth context matches this request"))
    }

    /// `GetCardChallenge(request) -> challenge` (spec.md §4.10 point 1).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_card_challenge(
        &self,
        realm_id: &[u8],
        auth_method: AuthMethod,
        app_context_url: &str,
    ) -> Result<CardChallenge> {
        let index = self.find_config(realm_id, auth_method, app_context_url)?;
        let config = &self.configs[index];

        let session_id = self.sessions.new_session(Instant::now(), index as u64);
        let (ephemeral_private_key, ephemeral_public_key, nonce) =
            derive_challenge_material(config.scheme.curve, config.scheme.hash, &session_id)?;

        let (static_public_key, certificate) = if config.scheme.kx.needs_realm_static() {
            let (public, cert) = self
                .keys
                .get(&config.realm_id)
                .ok_or_else(|| Error::policy("no realm static key configured for this scheme"))?;
            (Some(public), Some(cert))
        } else {
            (None, None)
        };

        Ok(CardChallenge {
            session_id,
            ephemeral_private_key,
            ephemeral_public_key,
            nonce,
            static_public_key,
            certificate,
            login_url: config.auth_server_login_url.clone(),
            app_start_url: config.app_start_url.clone(),
        })
    }

    /// `GetAgentAuthContext(session_id) -> context` (spec.md §4.10 point
    /// 2). `sid.AD()` is the originally encoded configuration index; it
    /// must be in range (spec.md §4.10 "Session-id encoded index").
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_agent_auth_context(&self, session_id: &SessionId) -> Result<AgentAuthContext> {
        self.sessions.check(Instant::now(), session_id)?;

        let index = session_id.ad();
        let config = usize::try_from(index)
            .ok()
            .and_then(|i| self.configs.get(i))
            .ok_or_else(|| Error::validation("session id's encoded configuration index is out of range"))?;

        let static_cert = if config.scheme.kx.needs_realm_static() {
            self.keys.get(&config.realm_id).map(|(_, cert)| cert)
        } else {
            None
        };

        Ok(AgentAuthContext {
            auth_method: config.auth_method,
            static_cert,
            app_context_url: config.app_context_url.clone(),
            auth_server_get_challenge_url: config.auth_server_get_challenge_url.clone(),
            auth_server_login_url: config.auth_server_login_url.clone(),
            app_start_url: config.app_start_url.clone(),
        })
    }
}

/// The challenge-setter (spec.md §4.10): deterministic, HKDF-based, seeded
/// only by the session id, so the value can be recomputed by whichever
/// server process later needs it without storing the ephemeral key
/// alongside the session. Derives the ephemeral private/public keypair and
/// a 32-byte nonce.
fn derive_challenge_material(curve: Curve, hash: HashAlgorithm, sid: &SessionId) -> Result<(Vec<u8>, Vec<u8>, [u8; 32])> {
    const SALT: &[u8] = b"KerPass-Challenge-Setter";
    let private = hash.hkdf_expand(SALT, sid.as_bytes(), b"ephemeral-key", curve.privkey_len());
    let public = curve.pubkey_from_private(&private)?;
    let nonce_bytes = hash.hkdf_expand(SALT, sid.as_bytes(), b"nonce", 32);
    let mut nonce = [0u8; 32];
    nonce.copy_from_slice(&nonce_bytes);
    Ok((private, public, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_method::Protocol;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeKeyStore(HashMap<Vec<u8>, (Vec<u8>, Vec<u8>)>);

    impl RealmStaticKeyStore for FakeKeyStore {
        fn get(&self, realm_id: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
            self.0.get(realm_id).cloned()
        }
    }

    fn otp_scheme() -> Scheme {
        Scheme::parse("Kerpass_SHA256_25519_E1S1_T30_B10_P6_S1").unwrap()
    }

    fn e1s2_scheme() -> Scheme {
        Scheme::parse("Kerpass_SHA256_25519_E1S2_T30_B32_P8_S1").unwrap()
    }

    fn context(realm: &[u8], scheme: Scheme, app_context_url: &str) -> AuthContext {
        AuthContext {
            realm_id: realm.to_vec(),
            auth_method: AuthMethod::new(Protocol::SlpDirect, 1, &scheme).unwrap(),
            app_context_url: app_context_url.to_string(),
            auth_server_get_challenge_url: "https://auth/challenge".to_string(),
            auth_server_login_url: "https://auth/login".to_string(),
            app_start_url: "https://app/start".to_string(),
            scheme,
        }
    }

    #[test]
    fn get_card_challenge_finds_the_matching_context() {
        let ctx = context(b"realm-a", otp_scheme(), "https://app/ctx");
        let method = ctx.auth_method;
        let factory = ChallengeFactory::new(
            vec![ctx],
            SessionIdFactory::new(Duration::from_secs(64)).unwrap(),
            FakeKeyStore(HashMap::new()),
        );

        let challenge = factory.get_card_challenge(b"realm-a", method, "https://app/ctx").unwrap();
        assert_eq!(challenge.ephemeral_public_key.len(), Curve::X25519.pubkey_len());
        assert!(challenge.static_public_key.is_none());
    }

    #[test]
    fn get_card_challenge_loads_static_key_when_scheme_needs_it() {
        let ctx = context(b"realm-b", e1s2_scheme(), "https://app/ctx");
        let method = ctx.auth_method;
        let mut keys = HashMap::new();
        keys.insert(b"realm-b".to_vec(), (vec![9u8; 32], vec![1u8; 4]));
        let factory = ChallengeFactory::new(
            vec![ctx],
            SessionIdFactory::new(Duration::from_secs(64)).unwrap(),
            FakeKeyStore(keys),
        );

        let challenge = factory.get_card_challenge(b"realm-b", method, "https://app/ctx").unwrap();
        assert_eq!(challenge.static_public_key, Some(vec![9u8; 32]));
        assert_eq!(challenge.certificate, Some(vec![1u8; 4]));
    }

    #[test]
    fn get_card_challenge_fails_when_no_context_matches() {
        let ctx = context(b"realm-a", otp_scheme(), "https://app/ctx");
        let method = ctx.auth_method;
        let factory = ChallengeFactory::new(
            vec![ctx],
            SessionIdFactory::new(Duration::from_secs(64)).unwrap(),
            FakeKeyStore(HashMap::new()),
        );

        let err = factory.get_card_challenge(b"realm-a", method, "https://app/other").unwrap_err();
        assert!(err.is_policy());
    }

    #[test]
    fn get_agent_auth_context_round_trips_through_a_minted_session_id() {
        let ctx = context(b"realm-a", otp_scheme(), "https://app/ctx");
        let method = ctx.auth_method;
        let factory = ChallengeFactory::new(
            vec![ctx],
            SessionIdFactory::new(Duration::from_secs(64)).unwrap(),
            FakeKeyStore(HashMap::new()),
        );

        let challenge = factory.get_card_challenge(b"realm-a", method, "https://app/ctx").unwrap();
        let agent_ctx = factory.get_agent_auth_context(&challenge.session_id).unwrap();
        assert_eq!(agent_ctx.app_context_url, "https://app/ctx");
        assert!(agent_ctx.static_cert.is_none());
    }

    #[test]
    fn derive_challenge_material_is_deterministic_on_session_id() {
        let t0 = Instant::now();
        let factory_sessions = SessionIdFactory::starting_at(Duration::from_secs(64), t0).unwrap();
        let sid = factory_sessions.new_session(t0, 3);
        let a = derive_challenge_material(Curve::X25519, HashAlgorithm::Sha256, &sid).unwrap();
        let b = derive_challenge_material(Curve::X25519, HashAlgorithm::Sha256, &sid).unwrap();
        assert_eq!(a.1, b.1);
        assert_eq!(a.2, b.2);
    }
}
