//! `HandshakeState`: drives one side of a pattern through its message
//! sequence, and the `Noise_<Pattern>_<Curve>_<Cipher>_<Hash>` naming-string
//! parser (spec.md §4.3, §6).

use kerpass_crypto::{CipherAlgorithm, Curve, HashAlgorithm, KeyPair};
use kerpass_error::{Error, Result};
use kerpass_registry::Registry;

use crate::pattern::{KeySlot, Pattern, Role, Token};
use crate::symmetric::SymmetricState;
use crate::transport::{TransportKeys, MAX_MESSAGE_LEN};

/// The AEAD authentication tag length all of `kerpass-crypto`'s ciphers use.
const TAG_LEN: usize = 16;

/// A parsed `Noise_<Pattern><Modifiers>_<Curve>_<Cipher>_<Hash>` config
/// string (spec.md §6).
#[derive(Clone)]
pub struct Config {
    pub pattern: Pattern,
    pub curve: Curve,
    pub cipher: CipherAlgorithm,
    pub hash: HashAlgorithm,
    protocol_name: String,
}

impl Config {
    /// Parses a config string against a registry of base pattern names,
    /// applying any `psk<n>`/`fallback` modifier suffixes found after the
    /// longest matching base name.
    pub fn parse(s: &str, patterns: &Registry<String, Pattern>) -> Result<Self> {
        let parts: Vec<&str> = s.split('_').collect();
        let [noise, pattern_token, curve, cipher, hash]: [&str; 5] = parts
            .clone()
            .try_into()
            .map_err(|_| Error::validation(format!("malformed Noise config string {s:?}")))?;
        if noise != "Noise" {
            return Err(Error::validation(format!("config string must start with Noise_: {s:?}")));
        }

        let base_name = longest_matching_pattern_name(pattern_token, patterns)
            .ok_or_else(|| Error::validation(format!("unrecognized pattern in {pattern_token:?}")))?;
        let base = patterns
            .get(&base_name)
            .expect("longest_matching_pattern_name only returns registered names");
        let suffix = &pattern_token[base_name.len()..];

        let mut pattern = (*base).clone();
        if !suffix.is_empty() {
            for modifier_text in suffix.split('+') {
                let modifier = parse_modifier(modifier_text)?;
                pattern = pattern.apply_modifier(modifier)?;
            }
        }

        Ok(Config {
            pattern,
            curve: Curve::from_name(curve)?,
            cipher: CipherAlgorithm::from_name(cipher)?,
            hash: HashAlgorithm::from_name(hash)?,
            protocol_name: s.to_string(),
        })
    }
}

fn longest_matching_pattern_name(token: &str, patterns: &Registry<String, Pattern>) -> Option<String> {
    let mut names = patterns.names();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names.into_iter().find(|n| token.starts_with(n.as_str()))
}

fn parse_modifier(text: &str) -> Result<crate::pattern::Modifier> {
    if text == "fallback" {
        return Ok(crate::pattern::Modifier::Fallback);
    }
    if let Some(n) = text.strip_prefix("psk") {
        let n: u8 = n
            .parse()
            .map_err(|_| Error::validation(format!("malformed psk modifier {text:?}")))?;
        return Ok(crate::pattern::Modifier::Psk(n));
    }
    Err(Error::validation(format!("unknown pattern modifier {text:?}")))
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum KeyKind {
    Static,
    Ephemeral,
}

/// Local and pre-shared key material supplied at `Initialize` time. Only
/// the keys the chosen pattern actually needs must be present; anything
/// else is simply ignored.
///
/// `preshared_keys` is consumed in order, one entry per `psk` token the
/// pattern processes (spec.md §3 "an ordered PSK list with cursor"). A
/// pattern can use more than one distinct PSK (as in the enrollment
/// protocol's `XXPSK45`, whose two `psk` tokens gate different messages
/// with different derived values); callers that don't know a later PSK
/// yet can supply it mid-handshake with [`HandshakeState::install_psk`]
/// instead of listing it here.
#[derive(Default)]
pub struct HandshakeKeys {
    pub local_static: Option<KeyPair>,
    pub local_ephemeral: Option<KeyPair>,
    pub remote_static: Option<Vec<u8>>,
    pub remote_ephemeral: Option<Vec<u8>>,
    pub preshared_keys: Vec<[u8; 32]>,
}

/// Drives one side of a handshake pattern through `WriteMessage`/
/// `ReadMessage` calls until `Split` yields the transport keys (spec.md
/// §4.3).
pub struct HandshakeState {
    pattern: Pattern,
    curve: Curve,
    role: Role,
    symmetric: SymmetricState,
    message_index: usize,
    local_static: Option<KeyPair>,
    local_ephemeral: Option<KeyPair>,
    remote_static: Option<Vec<u8>>,
    remote_ephemeral: Option<Vec<u8>>,
    preshared_keys: Vec<[u8; 32]>,
    psk_cursor: usize,
}

impl HandshakeState {
    /// `Initialize`: sets up `h`/`ck` from the protocol name and prologue,
    /// then mixes in every pre-message key the pattern requires (spec.md
    /// §4.3).
    pub fn initialize(config: &Config, role: Role, prologue: &[u8], keys: HandshakeKeys) -> Result<Self> {
        let mut symmetric =
            SymmetricState::initialize(config.hash, config.cipher, config.protocol_name.as_bytes());
        symmetric.mix_hash(prologue);

        let mut state = HandshakeState {
            pattern: config.pattern.clone(),
            curve: config.curve,
            role,
            symmetric,
            message_index: 0,
            local_static: keys.local_static,
            local_ephemeral: keys.local_ephemeral,
            remote_static: keys.remote_static,
            remote_ephemeral: keys.remote_ephemeral,
            preshared_keys: keys.preshared_keys,
            psk_cursor: 0,
        };

        let role_init = state.pattern.role_init(role).clone();
        let psk_mode = state.pattern.psk_count() > 0;
        for slot in &role_init.premessage_mix {
            let bytes = state.key_bytes_for_slot(*slot)?;
            state.symmetric.mix_hash(&bytes);
            // Noise's `pskN` rule: once any psk modifier is in play, every
            // pre-message ephemeral is also mixed in as key material, not
            // just hashed (spec.md §4.3).
            if psk_mode && matches!(slot, KeySlot::LocalEphemeral | KeySlot::RemoteEphemeral) {
                state.symmetric.mix_key(&bytes);
            }
        }
        Ok(state)
    }

    pub fn is_complete(&self) -> bool {
        self.message_index >= self.pattern.messages().len()
    }

    /// Appends a PSK discovered only partway through the handshake (spec.md
    /// §3 "an ordered PSK list with cursor"): the enrollment protocol's
    /// second `psk` token depends on a card id revealed inside an earlier
    /// message's own PSK-gated payload, so it cannot be supplied at
    /// `Initialize` time. Must be called before the cursor reaches the `psk`
    /// token that needs it.
    pub fn install_psk(&mut self, psk: [u8; 32]) {
        self.preshared_keys.push(psk);
    }

    pub fn remote_static_key(&self) -> Option<&[u8]> {
        self.remote_static.as_deref()
    }

    /// `WriteMessage`: encodes the next pattern message, appending the
    /// encrypted payload (spec.md §4.3, §8 invariant 6 for the size cap).
    #[tracing::instrument(level = "debug", skip(self, payload), fields(message_index = self.message_index))]
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let tokens = self.current_message_tokens(self.role)?.to_vec();
        let mut buffer = Vec::new();

        for token in &tokens {
            match token {
                Token::E => {
                    let kp = self.curve.generate_keypair();
                    self.symmetric.mix_hash(&kp.public);
                    buffer.extend_from_slice(&kp.public);
                    self.local_ephemeral = Some(kp);
                }
                Token::S => {
                    let public = self
                        .local_static
                        .as_ref()
                        .ok_or_else(|| Error::sequence("pattern requires a local static key that was not supplied"))?
                        .public
                        .clone();
                    let ciphertext = self.symmetric.encrypt_and_hash(&public)?;
                    buffer.extend_from_slice(&ciphertext);
                }
                Token::Psk => {
                    let psk = *self
                        .preshared_keys
                        .get(self.psk_cursor)
                        .ok_or_else(|| Error::sequence("pattern requires a psk that was not supplied"))?;
                    self.psk_cursor += 1;
                    self.symmetric.mix_key_and_hash(&psk);
                }
                dh_token => {
                    let shared = self.dh_for_token(*dh_token)?;
                    self.symmetric.mix_key(&shared);
                }
            }
        }

        let ciphertext = self.symmetric.encrypt_and_hash(payload)?;
        buffer.extend_from_slice(&ciphertext);

        if buffer.len() > MAX_MESSAGE_LEN {
            return Err(Error::size_limit(format!(
                "handshake message of {} bytes exceeds the {MAX_MESSAGE_LEN}-byte limit",
                buffer.len()
            )));
        }

        self.message_index += 1;
        Ok(buffer)
    }

    /// `ReadMessage`: the inverse of [`Self::write_message`], returning the
    /// decrypted payload.
    #[tracing::instrument(level = "debug", skip(self, message), fields(message_index = self.message_index))]
    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(Error::size_limit(format!(
                "handshake message of {} bytes exceeds the {MAX_MESSAGE_LEN}-byte limit",
                message.len()
            )));
        }
        let tokens = self.current_message_tokens(self.role.other())?.to_vec();
        let mut cursor = 0usize;

        for token in &tokens {
            match token {
                Token::E => {
                    let len = self.curve.pubkey_len();
                    let slice = message
                        .get(cursor..cursor + len)
                        .ok_or_else(|| Error::serialization("message too short for e token"))?;
                    self.symmetric.mix_hash(slice);
                    self.remote_ephemeral = Some(slice.to_vec());
                    cursor += len;
                }
                Token::S => {
                    let plain_len = self.curve.pubkey_len();
                    let len = if self.symmetric_has_key() {
                        plain_len + TAG_LEN
                    } else {
                        plain_len
                    };
                    let slice = message
                        .get(cursor..cursor + len)
                        .ok_or_else(|| Error::serialization("message too short for s token"))?;
                    let public = self.symmetric.decrypt_and_hash(slice)?;
                    self.curve.validate_pubkey(&public)?;
                    self.remote_static = Some(public);
                    cursor += len;
                }
                Token::Psk => {
                    let psk = *self
                        .preshared_keys
                        .get(self.psk_cursor)
                        .ok_or_else(|| Error::sequence("pattern requires a psk that was not supplied"))?;
                    self.psk_cursor += 1;
                    self.symmetric.mix_key_and_hash(&psk);
                }
                dh_token => {
                    let shared = self.dh_for_token(*dh_token)?;
                    self.symmetric.mix_key(&shared);
                }
            }
        }

        let payload = self.symmetric.decrypt_and_hash(&message[cursor..])?;
        self.message_index += 1;
        Ok(payload)
    }

    /// `Split`: valid only once every pattern message has been processed.
    pub fn split(self) -> Result<TransportKeys> {
        if !self.is_complete() {
            return Err(Error::sequence("split called before the handshake completed"));
        }
        let (c1, c2) = self.symmetric.split();
        Ok(match self.role {
            Role::Initiator => TransportKeys::new(c1, c2),
            Role::Responder => TransportKeys::new(c2, c1),
        })
    }

    pub fn handshake_hash(&self) -> &[u8] {
        self.symmetric.handshake_hash()
    }

    fn symmetric_has_key(&self) -> bool {
        self.symmetric.has_key()
    }

    fn current_message_tokens(&self, expected_sender: Role) -> Result<&[Token]> {
        let message = self
            .pattern
            .messages()
            .get(self.message_index)
            .ok_or_else(|| Error::sequence("handshake already complete"))?;
        if message.direction.sender() != expected_sender {
            return Err(Error::sequence("message invoked out of turn for this role"));
        }
        Ok(&message.tokens)
    }

    fn key_bytes_for_slot(&self, slot: KeySlot) -> Result<Vec<u8>> {
        match slot {
            KeySlot::LocalStatic => self
                .local_static
                .as_ref()
                .map(|kp| kp.public.clone())
                .ok_or_else(|| Error::sequence("pattern pre-message requires a local static key")),
            KeySlot::LocalEphemeral => self
                .local_ephemeral
                .as_ref()
                .map(|kp| kp.public.clone())
                .ok_or_else(|| Error::sequence("pattern pre-message requires a local ephemeral key")),
            KeySlot::RemoteStatic => self
                .remote_static
                .clone()
                .ok_or_else(|| Error::sequence("pattern pre-message requires the remote static key")),
            KeySlot::RemoteEphemeral => self
                .remote_ephemeral
                .clone()
                .ok_or_else(|| Error::sequence("pattern pre-message requires the remote ephemeral key")),
        }
    }

    fn dh_for_token(&self, token: Token) -> Result<Vec<u8>> {
        let (local_kind, remote_kind) = dh_operand_kinds(token, self.role);
        let local_priv = match local_kind {
            KeyKind::Static => self
                .local_static
                .as_ref()
                .map(|kp| kp.private.clone())
                .ok_or_else(|| Error::sequence("dh token requires a local static key"))?,
            KeyKind::Ephemeral => self
                .local_ephemeral
                .as_ref()
                .map(|kp| kp.private.clone())
                .ok_or_else(|| Error::sequence("dh token requires a local ephemeral key"))?,
        };
        let remote_pub = match remote_kind {
            KeyKind::Static => self
                .remote_static
                .clone()
                .ok_or_else(|| Error::sequence("dh token requires the remote static key"))?,
            KeyKind::Ephemeral => self
                .remote_ephemeral
                .clone()
                .ok_or_else(|| Error::sequence("dh token requires the remote ephemeral key"))?,
        };
        self.curve.dh(&local_priv, &remote_pub)
    }
}

/// Maps a DH token to (local key kind, remote key kind) for `role`,
/// following the Noise convention that `es`/`se` always name the
/// initiator's key first: `es` = DH(initiator.e, responder.s), `se` =
/// DH(initiator.s, responder.e) (spec.md §4.3).
fn dh_operand_kinds(token: Token, role: Role) -> (KeyKind, KeyKind) {
    match (token, role) {
        (Token::Ee, _) => (KeyKind::Ephemeral, KeyKind::Ephemeral),
        (Token::Ss, _) => (KeyKind::Static, KeyKind::Static),
        (Token::Es, Role::Initiator) => (KeyKind::Ephemeral, KeyKind::Static),
        (Token::Es, Role::Responder) => (KeyKind::Static, KeyKind::Ephemeral),
        (Token::Se, Role::Initiator) => (KeyKind::Static, KeyKind::Ephemeral),
        (Token::Se, Role::Responder) => (KeyKind::Ephemeral, KeyKind::Static),
        (Token::E | Token::S | Token::Psk, _) => unreachable!("only dh tokens reach dh_operand_kinds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::standard_patterns;

    fn config(name: &str) -> Config {
        let patterns = standard_patterns().unwrap();
        Config::parse(name, &patterns).unwrap()
    }

    #[test]
    fn parses_config_string() {
        let c = config("Noise_XX_25519_AESGCM_SHA256");
        assert_eq!(c.pattern.name(), "XX");
        assert_eq!(c.curve, Curve::X25519);
        assert_eq!(c.cipher, CipherAlgorithm::AesGcm);
        assert_eq!(c.hash, HashAlgorithm::Sha256);
    }

    #[test]
    fn parses_config_string_with_psk_modifier() {
        let c = config("Noise_XXpsk0_25519_ChaChaPoly_BLAKE2s");
        assert_eq!(c.pattern.psk_count(), 1);
    }

    #[test]
    fn rejects_unknown_pattern() {
        let patterns = standard_patterns().unwrap();
        assert!(Config::parse("Noise_ZZ_25519_AESGCM_SHA256", &patterns).is_err());
    }

    fn run_nn_handshake(cipher: CipherAlgorithm, hash: HashAlgorithm) -> (TransportKeys, TransportKeys) {
        let patterns = standard_patterns().unwrap();
        let base = patterns.get(&"NN".to_string()).unwrap();
        let config = Config {
            pattern: (*base).clone(),
            curve: Curve::X25519,
            cipher,
            hash,
            protocol_name: "Noise_NN_25519_AESGCM_SHA256".to_string(),
        };

        let mut initiator =
            HandshakeState::initialize(&config, Role::Initiator, b"", HandshakeKeys::default()).unwrap();
        let mut responder =
            HandshakeState::initialize(&config, Role::Responder, b"", HandshakeKeys::default()).unwrap();

        let msg1 = initiator.write_message(b"hello").unwrap();
        let payload1 = responder.read_message(&msg1).unwrap();
        assert_eq!(payload1, b"hello");

        let msg2 = responder.write_message(b"world").unwrap();
        let payload2 = initiator.read_message(&msg2).unwrap();
        assert_eq!(payload2, b"world");

        assert!(initiator.is_complete());
        assert!(responder.is_complete());
        assert_eq!(initiator.handshake_hash(), responder.handshake_hash());

        (initiator.split().unwrap(), responder.split().unwrap())
    }

    #[test]
    fn nn_handshake_then_transport_roundtrip() {
        let (mut a, mut b) = run_nn_handshake(CipherAlgorithm::AesGcm, HashAlgorithm::Sha256);
        let ct = a.send(b"transport message").unwrap();
        assert_eq!(b.receive(&ct).unwrap(), b"transport message");
    }

    #[test]
    fn xx_handshake_exchanges_static_keys() {
        let patterns = standard_patterns().unwrap();
        let base = patterns.get(&"XX".to_string()).unwrap();
        let config = Config {
            pattern: (*base).clone(),
            curve: Curve::X25519,
            cipher: CipherAlgorithm::AesGcm,
            hash: HashAlgorithm::Sha256,
            protocol_name: "Noise_XX_25519_AESGCM_SHA256".to_string(),
        };

        let initiator_static = Curve::X25519.generate_keypair();
        let responder_static = Curve::X25519.generate_keypair();
        let initiator_static_public = initiator_static.public.clone();
        let responder_static_public = responder_static.public.clone();

        let mut initiator = HandshakeState::initialize(
            &config,
            Role::Initiator,
            b"",
            HandshakeKeys {
                local_static: Some(initiator_static),
                ..Default::default()
            },
        )
        .unwrap();
        let mut responder = HandshakeState::initialize(
            &config,
            Role::Responder,
            b"",
            HandshakeKeys {
                local_static: Some(responder_static),
                ..Default::default()
            },
        )
        .unwrap();

        let m1 = initiator.write_message(b"").unwrap();
        responder.read_message(&m1).unwrap();
        let m2 = responder.write_message(b"").unwrap();
        initiator.read_message(&m2).unwrap();
        let m3 = initiator.write_message(b"").unwrap();
        responder.read_message(&m3).unwrap();

        assert_eq!(responder.remote_static_key(), Some(initiator_static_public.as_slice()));
        assert_eq!(initiator.remote_static_key(), Some(responder_static_public.as_slice()));
    }

    #[test]
    fn psk_modifier_reused_across_two_tokens_consumes_the_same_cursor_entry() {
        let patterns = standard_patterns().unwrap();
        let base = patterns.get(&"NN".to_string()).unwrap();
        let mut pattern = (*base).clone();
        pattern = pattern.apply_modifier(crate::pattern::Modifier::Psk(0)).unwrap();
        assert_eq!(pattern.psk_count(), 1);

        let config = Config {
            pattern,
            curve: Curve::X25519,
            cipher: CipherAlgorithm::AesGcm,
            hash: HashAlgorithm::Sha256,
            protocol_name: "Noise_NNpsk0_25519_AESGCM_SHA256".to_string(),
        };

        let psk = [7u8; 32];
        let mut initiator = HandshakeState::initialize(
            &config,
            Role::Initiator,
            b"",
            HandshakeKeys {
                preshared_keys: vec![psk],
                ..Default::default()
            },
        )
        .unwrap();
        let mut responder = HandshakeState::initialize(
            &config,
            Role::Responder,
            b"",
            HandshakeKeys {
                preshared_keys: vec![psk],
                ..Default::default()
            },
        )
        .unwrap();

        let msg1 = initiator.write_message(b"").unwrap();
        responder.read_message(&msg1).unwrap();
        let msg2 = responder.write_message(b"").unwrap();
        initiator.read_message(&msg2).unwrap();

        assert_eq!(initiator.psk_cursor, 1);
        assert_eq!(responder.psk_cursor, 1);
        assert_eq!(initiator.handshake_hash(), responder.handshake_hash());
    }

    #[test]
    fn missing_psk_fails_with_sequence_error() {
        let patterns = standard_patterns().unwrap();
        let base = patterns.get(&"NN".to_string()).unwrap();
        let pattern = (*base).clone().apply_modifier(crate::pattern::Modifier::Psk(0)).unwrap();
        let config = Config {
            pattern,
            curve: Curve::X25519,
            cipher: CipherAlgorithm::AesGcm,
            hash: HashAlgorithm::Sha256,
            protocol_name: "Noise_NNpsk0_25519_AESGCM_SHA256".to_string(),
        };

        let mut initiator =
            HandshakeState::initialize(&config, Role::Initiator, b"", HandshakeKeys::default()).unwrap();
        assert!(initiator.write_message(b"").is_err());
    }

    #[test]
    fn write_message_out_of_turn_fails() {
        let patterns = standard_patterns().unwrap();
        let base = patterns.get(&"NN".to_string()).unwrap();
        let config = Config {
            pattern: (*base).clone(),
            curve: Curve::X25519,
            cipher: CipherAlgorithm::AesGcm,
            hash: HashAlgorithm::Sha256,
            protocol_name: "Noise_NN_25519_AESGCM_SHA256".to_string(),
        };
        let mut responder =
            HandshakeState::initialize(&config, Role::Responder, b"", HandshakeKeys::default()).unwrap();
        assert!(responder.write_message(b"").is_err());
    }
}
