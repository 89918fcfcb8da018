//! SLP envelope validation: structural and scheme-consistency checks over
//! the already-decoded `AppAuthRequest` / `CardChallengeRequest` /
//! `CardChallenge` / `AgentAuthContext` wire messages (spec.md §2 "SLP
//! envelope"). Decoding itself is `crate::wire`'s job — the envelope
//! marshaller is out of scope (spec.md §1 Non-goals); this module is the
//! validation the component table still asks for on top of it.
//!
//! `AppAuthRequest` and `CardChallengeRequest` share a wire shape (spec.md
//! §6), so both are validated by [`validate_card_challenge_request`].

use kerpass_error::{Error, Result};
use kerpass_ephemsec::Scheme;

use crate::auth_method::{AuthMethod, Protocol};
use crate::wire::{AgentAuthContext, CardChallenge, CardChallengeRequest};

/// Checks a `CardChallengeRequest` (also the wire shape for
/// `AppAuthRequest`): non-empty realm id, a well-formed `auth_method`
/// encoding, and a non-empty `app_context_url`.
pub fn validate_card_challenge_request(req: &CardChallengeRequest) -> Result<AuthMethod> {
    if req.realm_id.is_empty() {
        return Err(Error::validation("realm_id must not be empty"));
    }
    if req.app_context_url.is_empty() {
        return Err(Error::validation("app_context_url must not be empty"));
    }
    AuthMethod::decode(req.auth_method)
}

/// Checks a `CardChallenge` against the scheme it was minted for: the
/// ephemeral public key and nonce are the right lengths, and a static
/// public key/certificate are present exactly when `scheme.kx` needs one
/// (spec.md §4.10).
pub fn validate_card_challenge(challenge: &CardChallenge, scheme: &Scheme) -> Result<()> {
    if challenge.ephemeral_public_key.len() != scheme.curve.pubkey_len() {
        return Err(Error::validation("ephemeral_public_key length does not match the scheme's curve"));
    }
    if challenge.nonce.len() != 32 {
        return Err(Error::validation("nonce must be 32 bytes"));
    }

    let needs_static = scheme.kx.needs_realm_static();
    if needs_static != challenge.static_public_key.is_some() {
        return Err(Error::validation("static_public_key presence does not match the scheme's key-exchange mode"));
    }
    if needs_static != challenge.certificate.is_some() {
        return Err(Error::validation("certificate presence does not match the scheme's key-exchange mode"));
    }
    if let Some(spk) = &challenge.static_public_key {
        if spk.len() != scheme.curve.pubkey_len() {
            return Err(Error::validation("static_public_key length does not match the scheme's curve"));
        }
    }
    if challenge.login_url.is_empty() || challenge.app_start_url.is_empty() {
        return Err(Error::validation("login_url and app_start_url must not be empty"));
    }
    Ok(())
}

/// Checks an `AgentAuthContext`: `selected_protocol` decodes to a known
/// `Protocol`, and its URLs are non-empty.
pub fn validate_agent_auth_context(ctx: &AgentAuthContext) -> Result<Protocol> {
    let protocol = Protocol::from_code(ctx.selected_protocol as u32)?;
    if ctx.app_context_url.is_empty()
        || ctx.auth_server_get_challenge_url.is_empty()
        || ctx.auth_server_login_url.is_empty()
        || ctx.app_start_url.is_empty()
    {
        return Err(Error::validation("AgentAuthContext URLs must not be empty"));
    }
    Ok(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerpass_session::SESSION_ID_LEN;

    fn scheme(kx: &str) -> Scheme {
        Scheme::parse(&format!("Kerpass_SHA256_25519_{kx}_T30_B10_P6_S1")).unwrap()
    }

    #[test]
    fn validates_card_challenge_request() {
        let req = CardChallengeRequest {
            realm_id: vec![1u8; 4],
            auth_method: AuthMethod::new(Protocol::SlpDirect, 1, &scheme("E1S1")).unwrap().encode(),
            app_context_url: "https://app".to_string(),
        };
        assert_eq!(validate_card_challenge_request(&req).unwrap(), AuthMethod::new(Protocol::SlpDirect, 1, &scheme("E1S1")).unwrap());
    }

    #[test]
    fn rejects_request_with_empty_realm() {
        let req = CardChallengeRequest {
            realm_id: vec![],
            auth_method: 0,
            app_context_url: "https://app".to_string(),
        };
        assert!(validate_card_challenge_request(&req).is_err());
    }

    #[test]
    fn card_challenge_requires_static_fields_for_e1s2() {
        let s = scheme("E1S2");
        let with_static = CardChallenge {
            session_id: [0u8; SESSION_ID_LEN],
            ephemeral_public_key: vec![0u8; s.curve.pubkey_len()],
            nonce: vec![0u8; 32],
            static_public_key: Some(vec![0u8; s.curve.pubkey_len()]),
            certificate: Some(vec![1u8; 4]),
            login_url: "https://login".to_string(),
            app_start_url: "https://app/start".to_string(),
        };
        assert!(validate_card_challenge(&with_static, &s).is_ok());

        let missing_static = CardChallenge {
            static_public_key: None,
            certificate: None,
            ..with_static
        };
        assert!(validate_card_challenge(&missing_static, &s).is_err());
    }

    #[test]
    fn card_challenge_rejects_static_fields_for_e1s1() {
        let s = scheme("E1S1");
        let challenge = CardChallenge {
            session_id: [0u8; SESSION_ID_LEN],
            ephemeral_public_key: vec![0u8; s.curve.pubkey_len()],
            nonce: vec![0u8; 32],
            static_public_key: Some(vec![0u8; s.curve.pubkey_len()]),
            certificate: Some(vec![1u8; 4]),
            login_url: "https://login".to_string(),
            app_start_url: "https://app/start".to_string(),
        };
        assert!(validate_card_challenge(&challenge, &s).is_err());
    }

    #[test]
    fn validates_agent_auth_context() {
        let ctx = AgentAuthContext {
            selected_protocol: 0,
            session_id: [0u8; SESSION_ID_LEN],
            static_cert: None,
            app_context_url: "https://app".to_string(),
            auth_server_get_challenge_url: "https://auth/challenge".to_string(),
            auth_server_login_url: "https://auth/login".to_string(),
            app_start_url: "https://app/start".to_string(),
        };
        assert_eq!(validate_agent_auth_context(&ctx).unwrap(), Protocol::SlpDirect);
    }

    #[test]
    fn rejects_agent_auth_context_with_unknown_protocol() {
        let ctx = AgentAuthContext {
            selected_protocol: 9,
            session_id: [0u8; SESSION_ID_LEN],
            static_cert: None,
            app_context_url: "https://app".to_string(),
            auth_server_get_challenge_url: "https://auth/challenge".to_string(),
            auth_server_login_url: "https://auth/login".to_string(),
            app_start_url: "https://app/start".to_string(),
        };
        assert!(validate_agent_auth_context(&ctx).is_err());
    }
}
