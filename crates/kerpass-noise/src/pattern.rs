//! The handshake pattern DSL: tokens, pre-messages, message sequences, and
//! the `psk<n>`/`fallback` modifiers (spec.md §4.1).
//!
//! A [`Pattern`] is built once (by [`Pattern::parse`] or a modifier) and is
//! immutable afterward; [`HandshakeState`](crate::handshake::HandshakeState)
//! only ever reads it.

use std::collections::HashSet;

use kerpass_error::{Error, Result};

/// One handshake message token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    E,
    S,
    Ee,
    Es,
    Se,
    Ss,
    Psk,
}

impl Token {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "e" => Ok(Token::E),
            "s" => Ok(Token::S),
            "ee" => Ok(Token::Ee),
            "es" => Ok(Token::Es),
            "se" => Ok(Token::Se),
            "ss" => Ok(Token::Ss),
            "psk" => Ok(Token::Psk),
            other => Err(Error::validation(format!("unknown pattern token {other:?}"))),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Token::E => "e",
            Token::S => "s",
            Token::Ee => "ee",
            Token::Es => "es",
            Token::Se => "se",
            Token::Ss => "ss",
            Token::Psk => "psk",
        }
    }

    fn is_dh_or_psk(&self) -> bool {
        !matches!(self, Token::E | Token::S)
    }
}

/// Which side of a handshake a message or key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn other(self) -> Self {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

/// The direction a message travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    InitiatorToResponder,
    ResponderToInitiator,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::InitiatorToResponder => Direction::ResponderToInitiator,
            Direction::ResponderToInitiator => Direction::InitiatorToResponder,
        }
    }

    pub fn sender(self) -> Role {
        match self {
            Direction::InitiatorToResponder => Role::Initiator,
            Direction::ResponderToInitiator => Role::Responder,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePattern {
    pub direction: Direction,
    pub tokens: Vec<Token>,
}

/// One key slot a role either holds locally or has learned from its peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeySlot {
    LocalStatic,
    LocalEphemeral,
    RemoteStatic,
    RemoteEphemeral,
}

/// What a role must do during `Initialize`: mix each of these public keys
/// into the handshake hash, in order (spec.md §4.3, "process pre-messages").
#[derive(Clone, Debug, Default)]
pub struct RoleInit {
    pub premessage_mix: Vec<KeySlot>,
}

/// A modifier appended to a base pattern name (spec.md §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    Psk(u8),
    Fallback,
}

/// A fully validated handshake pattern: pre-messages, message sequence, and
/// the per-role key-mixing order derived from them.
#[derive(Clone, Debug)]
pub struct Pattern {
    name: String,
    pre_initiator: Vec<Token>,
    pre_responder: Vec<Token>,
    messages: Vec<MessagePattern>,
    psk_count: usize,
    one_way: bool,
    initiator_init: RoleInit,
    responder_init: RoleInit,
}

impl Pattern {
    /// Parses the line-oriented pattern DSL (spec.md §4.1):
    /// optional `->`/`<-` pre-message lines, an optional bare `...`
    /// separator, then the `->`/`<-` message lines.
    pub fn parse(name: impl Into<String>, dsl: &str) -> Result<Self> {
        let lines: Vec<&str> = dsl.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let has_marker = lines.iter().any(|l| *l == "...");

        let mut pre_initiator = Vec::new();
        let mut pre_responder = Vec::new();
        let mut messages = Vec::new();
        let mut in_premessage = has_marker;

        for line in lines {
            if line == "..." {
                in_premessage = false;
                continue;
            }
            let (direction, rest) = if let Some(r) = line.strip_prefix("->") {
                (Direction::InitiatorToResponder, r)
            } else if let Some(r) = line.strip_prefix("<-") {
                (Direction::ResponderToInitiator, r)
            } else {
                return Err(Error::validation(format!(
                    "pattern line must start with -> or <-: {line:?}"
                )));
            };
            let tokens = parse_tokens(rest)?;
            if in_premessage {
                match direction {
                    Direction::InitiatorToResponder => pre_initiator.extend(tokens),
                    Direction::ResponderToInitiator => pre_responder.extend(tokens),
                }
            } else {
                messages.push(MessagePattern { direction, tokens });
            }
        }

        Self::build(name.into(), pre_initiator, pre_responder, messages)
    }

    fn build(
        name: String,
        pre_initiator: Vec<Token>,
        pre_responder: Vec<Token>,
        messages: Vec<MessagePattern>,
    ) -> Result<Self> {
        for t in pre_initiator.iter().chain(pre_responder.iter()) {
            if t.is_dh_or_psk() {
                return Err(Error::validation(
                    "pre-messages may only contain e and s tokens",
                ));
            }
        }
        if messages.is_empty() {
            return Err(Error::validation("a pattern must have at least one message"));
        }

        let mut expected = Direction::InitiatorToResponder;
        for m in &messages {
            if m.direction != expected {
                return Err(Error::validation(
                    "messages must strictly alternate direction, starting with the initiator",
                ));
            }
            expected = expected.flip();
        }

        let mut initiator_has: HashSet<Token> = pre_initiator.iter().copied().collect();
        let mut responder_has: HashSet<Token> = pre_responder.iter().copied().collect();
        let mut psk_count = 0usize;

        for m in &messages {
            for tok in &m.tokens {
                match tok {
                    Token::E | Token::S => {
                        let has = match m.direction {
                            Direction::InitiatorToResponder => &mut initiator_has,
                            Direction::ResponderToInitiator => &mut responder_has,
                        };
                        if has.contains(tok) {
                            return Err(Error::validation(format!(
                                "token {:?} repeats in {:?}'s trajectory",
                                tok,
                                m.direction.sender()
                            )));
                        }
                        has.insert(*tok);
                    }
                    Token::Ee => {
                        if !(initiator_has.contains(&Token::E) && responder_has.contains(&Token::E)) {
                            return Err(Error::validation(
                                "ee requires both ephemeral keys published first",
                            ));
                        }
                    }
                    Token::Es => {
                        if !(initiator_has.contains(&Token::E) && responder_has.contains(&Token::S)) {
                            return Err(Error::validation(
                                "es requires the initiator's e and the responder's s published first",
                            ));
                        }
                    }
                    Token::Se => {
                        if !(initiator_has.contains(&Token::S) && responder_has.contains(&Token::E)) {
                            return Err(Error::validation(
                                "se requires the initiator's s and the responder's e published first",
                            ));
                        }
                    }
                    Token::Ss => {
                        if !(initiator_has.contains(&Token::S) && responder_has.contains(&Token::S)) {
                            return Err(Error::validation(
                                "ss requires both static keys published first",
                            ));
                        }
                    }
                    Token::Psk => psk_count += 1,
                }
            }
        }

        let one_way = messages.len() == 1;
        let initiator_init = build_role_init(Role::Initiator, &pre_initiator, &pre_responder);
        let responder_init = build_role_init(Role::Responder, &pre_initiator, &pre_responder);

        Ok(Pattern {
            name,
            pre_initiator,
            pre_responder,
            messages,
            psk_count,
            one_way,
            initiator_init,
            responder_init,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn messages(&self) -> &[MessagePattern] {
        &self.messages
    }

    pub fn pre_initiator(&self) -> &[Token] {
        &self.pre_initiator
    }

    pub fn pre_responder(&self) -> &[Token] {
        &self.pre_responder
    }

    pub fn psk_count(&self) -> usize {
        self.psk_count
    }

    pub fn one_way(&self) -> bool {
        self.one_way
    }

    pub fn role_init(&self, role: Role) -> &RoleInit {
        match role {
            Role::Initiator => &self.initiator_init,
            Role::Responder => &self.responder_init,
        }
    }

    /// Regenerates the canonical DSL text for this pattern. `Pattern::parse`
    /// applied to this string round-trips to an equal pattern (spec.md §8).
    pub fn dsl(&self) -> String {
        let mut out = String::new();
        let has_pre = !self.pre_initiator.is_empty() || !self.pre_responder.is_empty();
        if !self.pre_initiator.is_empty() {
            out.push_str("-> ");
            out.push_str(&join_tokens(&self.pre_initiator));
            out.push('\n');
        }
        if !self.pre_responder.is_empty() {
            out.push_str("<- ");
            out.push_str(&join_tokens(&self.pre_responder));
            out.push('\n');
        }
        if has_pre {
            out.push_str("...\n");
        }
        for m in &self.messages {
            out.push_str(match m.direction {
                Direction::InitiatorToResponder => "-> ",
                Direction::ResponderToInitiator => "<- ",
            });
            out.push_str(&join_tokens(&m.tokens));
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Applies a `psk<n>` or `fallback` modifier, producing a new, separately
    /// validated pattern (spec.md §4.1).
    pub fn apply_modifier(&self, modifier: Modifier) -> Result<Pattern> {
        match modifier {
            Modifier::Psk(n) => self.apply_psk(n),
            Modifier::Fallback => self.apply_fallback(),
        }
    }

    fn apply_psk(&self, n: u8) -> Result<Pattern> {
        let mut messages = self.messages.clone();
        if n == 0 {
            messages[0].tokens.insert(0, Token::Psk);
        } else {
            let idx = n as usize - 1;
            let msg = messages
                .get_mut(idx)
                .ok_or_else(|| Error::validation(format!("psk{n} exceeds the message count")))?;
            msg.tokens.push(Token::Psk);
        }
        Self::build(
            format!("{}psk{}", self.name, n),
            self.pre_initiator.clone(),
            self.pre_responder.clone(),
            messages,
        )
    }

    /// Removes the first message, merging its tokens into its sender's
    /// pre-message list, and relabels the remaining messages so the new
    /// first message's sender is again called the initiator (spec.md §4.1;
    /// this follows the Noise fallback convention of the sender switching
    /// roles after the dropped message).
    fn apply_fallback(&self) -> Result<Pattern> {
        if self.messages.len() < 2 {
            return Err(Error::validation("fallback requires at least two messages"));
        }
        let first = self.messages[0].clone();

        let mut pre_initiator = self.pre_initiator.clone();
        let mut pre_responder = self.pre_responder.clone();
        match first.direction {
            Direction::InitiatorToResponder => pre_initiator.extend(first.tokens),
            Direction::ResponderToInitiator => pre_responder.extend(first.tokens),
        }

        let new_first_dir = self.messages[1].direction;
        let flip = new_first_dir != Direction::InitiatorToResponder;
        let relabel = |d: Direction| if flip { d.flip() } else { d };

        let messages: Vec<MessagePattern> = self.messages[1..]
            .iter()
            .map(|m| MessagePattern {
                direction: relabel(m.direction),
                tokens: m.tokens.clone(),
            })
            .collect();
        let (pre_initiator, pre_responder) = if flip {
            (pre_responder, pre_initiator)
        } else {
            (pre_initiator, pre_responder)
        };

        Self::build(format!("{}fallback", self.name), pre_initiator, pre_responder, messages)
    }
}

fn build_role_init(role: Role, pre_initiator: &[Token], pre_responder: &[Token]) -> RoleInit {
    let mut mix = Vec::with_capacity(pre_initiator.len() + pre_responder.len());
    for t in pre_initiator {
        mix.push(slot_for(role, Role::Initiator, *t));
    }
    for t in pre_responder {
        mix.push(slot_for(role, Role::Responder, *t));
    }
    RoleInit { premessage_mix: mix }
}

fn slot_for(role: Role, owner: Role, token: Token) -> KeySlot {
    let local = role == owner;
    match (token, local) {
        (Token::E, true) => KeySlot::LocalEphemeral,
        (Token::E, false) => KeySlot::RemoteEphemeral,
        (Token::S, true) => KeySlot::LocalStatic,
        (Token::S, false) => KeySlot::RemoteStatic,
        _ => unreachable!("pre-message tokens are restricted to e/s by Pattern::build"),
    }
}

fn parse_tokens(rest: &str) -> Result<Vec<Token>> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(Token::parse)
        .collect()
}

fn join_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
