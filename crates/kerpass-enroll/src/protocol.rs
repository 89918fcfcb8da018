//! The enrollment FSM: client and server state-function chains over the
//! `XXPSK45` pattern, driven by [`kerpass_session::run`] (spec.md §4.9).

use std::sync::Arc;

use kerpass_crypto::{CipherAlgorithm, Curve, HashAlgorithm, KeyPair};
use kerpass_error::{Error, Result};
use kerpass_noise::{Config, HandshakeKeys, HandshakeState, Role};
use kerpass_registry::Registry;
use kerpass_session::fsm::{CancellationToken, ExitHandler, FsmRole, StateFn, StepOutput, Transport};
use rand::RngCore;
use rand_core::OsRng;

use crate::pattern::{xxpsk45, XXPSK45};
use crate::psk::{derive_binding_psk, derive_card_psk};
use crate::records::{Card, EnrollAuthorization, ServerCard, ServerKey};
use crate::store::{check_authorization_realm, MemClientCredStore, MemServerCredStore};
use crate::wire::{EnrollAuthorizationMsg, EnrollCardCreateResp, EnrollReq};

fn enrollment_config(curve: Curve, cipher: CipherAlgorithm, hash: HashAlgorithm) -> Result<Config> {
    let patterns = Registry::new();
    patterns.set(XXPSK45.to_string(), xxpsk45()?)?;
    let name = format!("Noise_{}_{}_{}_{}", XXPSK45, curve.name(), cipher.name(), hash.name());
    Config::parse(&name, &patterns)
}

/// Everything the client side threads through its five state-functions.
pub struct ClientState {
    handshake: HandshakeState,
    realm_id: Vec<u8>,
    authorization_id: [u8; 32],
    client_share: [u8; 32],
    client_private_key: Vec<u8>,
    cred_store: Arc<MemClientCredStore>,
    /// Set once the card has been speculatively persisted, so the exit
    /// handler knows to roll it back on a later failure (spec.md §4.9:
    /// "If any subsequent step fails, the client removes the persisted
    /// card").
    persisted_card_id: Option<[u8; 32]>,
}

/// Drives the client side of enrollment to completion, persisting the new
/// card into `cred_store` on success and rolling it back on any failure
/// after it was speculatively written.
#[tracing::instrument(level = "debug", skip_all)]
pub fn enroll_client<T: Transport>(
    cancellation: &CancellationToken,
    curve: Curve,
    cipher: CipherAlgorithm,
    hash: HashAlgorithm,
    realm_id: Vec<u8>,
    authorization_id: [u8; 32],
    cred_store: Arc<MemClientCredStore>,
    transport: &mut T,
) -> Result<[u8; 32]> {
    let config = enrollment_config(curve, cipher, hash)?;
    let client_keypair = curve.generate_keypair();
    let mut client_share = [0u8; 32];
    OsRng.fill_bytes(&mut client_share);

    let client_private_key = client_keypair.private.clone();
    let handshake = HandshakeState::initialize(
        &config,
        Role::Initiator,
        &realm_id,
        HandshakeKeys {
            local_static: Some(client_keypair),
            ..Default::default()
        },
    )?;

    let state = ClientState {
        handshake,
        realm_id,
        authorization_id,
        client_share,
        client_private_key,
        cred_store: cred_store.clone(),
        persisted_card_id: None,
    };

    let mut exit_handler: Box<ExitHandler<'_, ClientState>> = Box::new(|state: &mut ClientState, _err: &Error| {
        if let Some(card_id) = state.persisted_card_id.take() {
            state.cred_store.remove(&card_id);
        }
    });

    let final_state = kerpass_session::run(
        cancellation,
        FsmRole::Initiator,
        state,
        Box::new(client_step0),
        transport,
        Some(&mut *exit_handler),
    )?;

    final_state
        .persisted_card_id
        .ok_or_else(|| Error::sequence("enrollment completed without persisting a card"))
}

fn client_step0(state: &mut ClientState, _inbound: &[u8]) -> Result<StepOutput<ClientState>> {
    let msg = state.handshake.write_message(b"")?;
    let envelope = EnrollReq {
        realm_id: state.realm_id.clone(),
        noise_message: msg,
    }
    .to_bytes()?;
    Ok(StepOutput::continue_with(envelope, Box::new(client_step1)))
}

fn client_step1(state: &mut ClientState, inbound: &[u8]) -> Result<StepOutput<ClientState>> {
    let certificate = state.handshake.read_message(inbound)?;
    let server_static = state.handshake.remote_static_key().unwrap_or(&[]);
    crate::pki::validate_certificate(server_static, &certificate)?;

    let auth_msg = EnrollAuthorizationMsg {
        authorization_id: state.authorization_id,
        client_psk_share: state.client_share.to_vec(),
    };
    let outbound = state.handshake.write_message(&auth_msg.to_bytes()?)?;
    Ok(StepOutput::continue_with(outbound, Box::new(client_step2)))
}

fn client_step2(state: &mut ClientState, inbound: &[u8]) -> Result<StepOutput<ClientState>> {
    let binding_psk = derive_binding_psk(&state.realm_id, state.handshake.handshake_hash(), &state.client_share);
    state.handshake.install_psk(binding_psk);

    let payload = state.handshake.read_message(inbound)?;
    let resp = EnrollCardCreateResp::from_bytes(&payload)?;

    let card_psk = derive_card_psk(
        &state.realm_id,
        &resp.card_id,
        state.handshake.handshake_hash(),
        &state.client_share,
        &resp.server_psk_share,
    );
    state.handshake.install_psk(card_psk);

    let card = Card {
        realm_id: state.realm_id.clone(),
        card_id: resp.card_id,
        client_private_key: state.client_private_key.clone(),
        psk: card_psk,
        app_name: resp.app_name,
    };
    state.cred_store.set(card);
    state.persisted_card_id = Some(resp.card_id);

    let outbound = state.handshake.write_message(b"")?;
    Ok(StepOutput::done(outbound))
}

/// Everything the server side threads through its state-functions.
pub struct ServerState {
    handshake: HandshakeState,
    realm_id: Vec<u8>,
    server_key: ServerKey,
    cred_store: Arc<MemServerCredStore>,
    app_name: String,
    app_logo: Vec<u8>,
    client_share: [u8; 32],
    server_share: [u8; 32],
    popped_authorization: Option<EnrollAuthorization>,
    card_id: Option<[u8; 32]>,
}

/// Drives the server side of one enrollment to completion. `key_for_realm`
/// loads the realm's static key and certificate; `app_name`/`app_logo`
/// describe the application being enrolled into.
#[tracing::instrument(level = "debug", skip_all)]
pub fn enroll_server<T: Transport>(
    cancellation: &CancellationToken,
    cipher: CipherAlgorithm,
    hash: HashAlgorithm,
    server_key: ServerKey,
    cred_store: Arc<MemServerCredStore>,
    app_name: String,
    app_logo: Vec<u8>,
    transport: &mut T,
) -> Result<[u8; 32]> {
    let mut server_share = [0u8; 32];
    OsRng.fill_bytes(&mut server_share);

    let state = ServerState {
        // Replaced once the client's realm id is known, in server_step0.
        handshake: placeholder_handshake(cipher, hash)?,
        realm_id: Vec::new(),
        server_key,
        cred_store,
        app_name,
        app_logo,
        client_share: [0u8; 32],
        server_share,
        popped_authorization: None,
        card_id: None,
    };

    let mut exit_handler: Box<ExitHandler<'_, ServerState>> = Box::new(|state: &mut ServerState, _err: &Error| {
        if let Some(auth) = state.popped_authorization.take() {
            state.cred_store.restore_authorization(auth);
        }
    });

    let final_state = kerpass_session::run(
        cancellation,
        FsmRole::Responder,
        state,
        Box::new(server_step0),
        transport,
        Some(&mut *exit_handler),
    )?;

    final_state
        .card_id
        .ok_or_else(|| Error::sequence("enrollment completed without minting a card id"))
}

/// A never-initialized handshake used only to give [`ServerState`] a valid
/// value before `server_step0` replaces it with the real one, once the
/// client's realm id (and hence its static key) is known.
fn placeholder_handshake(cipher: CipherAlgorithm, hash: HashAlgorithm) -> Result<HandshakeState> {
    let config = enrollment_config(Curve::X25519, cipher, hash)?;
    HandshakeState::initialize(&config, Role::Responder, b"", HandshakeKeys::default())
}

fn server_step0(state: &mut ServerState, inbound: &[u8]) -> Result<StepOutput<ServerState>> {
    let req = EnrollReq::from_bytes(inbound)?;
    if req.realm_id != state.server_key.realm_id {
        return Err(Error::policy("enrollment request targets a different realm than this server key"));
    }

    let config = enrollment_config(state.server_key.curve, CipherAlgorithm::AesGcm, HashAlgorithm::Sha256)?;
    let server_keypair = KeyPair {
        curve: state.server_key.curve,
        public: state.server_key.curve.pubkey_from_private(&state.server_key.static_private_key)?,
        private: state.server_key.static_private_key.clone(),
    };

    let mut handshake = HandshakeState::initialize(
        &config,
        Role::Responder,
        &req.realm_id,
        HandshakeKeys {
            local_static: Some(server_keypair),
            ..Default::default()
        },
    )?;
    handshake.read_message(&req.noise_message)?;

    let outbound = handshake.write_message(&state.server_key.certificate)?;
    state.handshake = handshake;
    state.realm_id = req.realm_id;
    Ok(StepOutput::continue_with(outbound, Box::new(server_step1)))
}

fn server_step1(state: &mut ServerState, inbound: &[u8]) -> Result<StepOutput<ServerState>> {
    let payload = state.handshake.read_message(inbound)?;
    let auth_msg = EnrollAuthorizationMsg::from_bytes(&payload)?;

    let popped = state
        .cred_store
        .pop_authorization(&auth_msg.authorization_id)
        .ok_or_else(|| Error::policy("no matching enroll-authorization record"))?;
    let authorization = check_authorization_realm(&state.cred_store, popped, &state.realm_id)?;
    state.popped_authorization = Some(authorization);

    let client_share: [u8; 32] = auth_msg
        .client_psk_share
        .get(..32)
        .ok_or_else(|| Error::validation("client_psk_share must be at least 32 bytes"))?
        .try_into()
        .expect("slice is exactly 32 bytes");
    state.client_share = client_share;

    let binding_psk = derive_binding_psk(&state.realm_id, state.handshake.handshake_hash(), &state.client_share);
    state.handshake.install_psk(binding_psk);

    let mut card_id = [0u8; 32];
    OsRng.fill_bytes(&mut card_id);

    let card_psk = derive_card_psk(
        &state.realm_id,
        &card_id,
        state.handshake.handshake_hash(),
        &state.client_share,
        &state.server_share,
    );
    state.handshake.install_psk(card_psk);

    let resp = EnrollCardCreateResp {
        card_id,
        server_psk_share: state.server_share.to_vec(),
        app_name: state.app_name.clone(),
        app_logo: state.app_logo.clone(),
    };
    let outbound = state.handshake.write_message(&resp.to_bytes()?)?;

    let authorization = state
        .popped_authorization
        .take()
        .expect("just set above");
    let server_card = ServerCard {
        realm_id: state.realm_id.clone(),
        card_id,
        client_public_key: state
            .handshake
            .remote_static_key()
            .ok_or_else(|| Error::sequence("remote static key missing after the client's s token"))?
            .to_vec(),
        psk: card_psk,
    };
    state.cred_store.put_card(server_card);
    state.card_id = Some(card_id);
    // The authorization has now been fully consumed; nothing left to
    // compensate if the closing message fails, since the card record
    // itself isn't removed by this protocol's exit handler (only the
    // authorization pop is).
    drop(authorization);

    Ok(StepOutput::continue_with(outbound, Box::new(server_step2)))
}

fn server_step2(state: &mut ServerState, inbound: &[u8]) -> Result<StepOutput<ServerState>> {
    state.handshake.read_message(inbound)?;
    Ok(StepOutput::done(Vec::new()))
}
