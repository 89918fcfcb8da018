//! The EPHEMSEC context hash the authentication layer folds into its salt
//! (spec.md §6 "EPHEMSEC context hash"): `SHA-256('R' || len(realm_id) ||
//! realm_id || 'A' || len(agent_ctx_hash) || agent_ctx_hash)`, where
//! `agent_ctx_hash = SHA-256(CBOR(AgentAuthContext))`.

use kerpass_crypto::HashAlgorithm;
use kerpass_error::{Error, Result};

use crate::wire::AgentAuthContext;

/// `SHA-256(CBOR(AgentAuthContext))`. The spec calls for CTAP2-canonical
/// CBOR; `AgentAuthContext::to_bytes` already emits its map keys in
/// ascending integer order, which is the part of CTAP2 canonicalization
/// that affects this hash's determinism between two encoders that both
/// follow the field order above (see `DESIGN.md`).
pub fn agent_context_hash(ctx: &AgentAuthContext) -> Result<[u8; 32]> {
    let encoded = ctx.to_bytes()?;
    let digest = HashAlgorithm::Sha256.hash(&[&encoded]);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Builds the EPHEMSEC context hash from a realm id and an already-computed
/// agent-context hash.
pub fn ephemsec_context_hash(realm_id: &[u8], agent_ctx_hash: &[u8; 32]) -> Result<[u8; 32]> {
    if realm_id.len() > 255 {
        return Err(Error::validation("realm_id must fit in a single length byte"));
    }
    let mut input = Vec::with_capacity(2 + realm_id.len() + 2 + agent_ctx_hash.len());
    input.push(b'R');
    input.push(realm_id.len() as u8);
    input.extend_from_slice(realm_id);
    input.push(b'A');
    input.push(agent_ctx_hash.len() as u8);
    input.extend_from_slice(agent_ctx_hash);

    let digest = HashAlgorithm::Sha256.hash(&[&input]);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}
