//! In-memory credential and key stores, each guarded by its own lock
//! (spec.md §5 "Shared resources": "MemServerCredStore and
//! MemClientCredStore: per-store mutex protecting their internal maps").

use std::collections::HashMap;

use kerpass_error::{Error, Result};
use parking_lot::Mutex;

use crate::records::{Card, EnrollAuthorization, ServerCard, ServerKey};

/// Realm-scoped static keys a server holds, keyed by realm id.
#[derive(Default)]
pub struct MemKeyStore {
    keys: Mutex<HashMap<Vec<u8>, ServerKey>>,
}

impl MemKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: ServerKey) {
        self.keys.lock().insert(key.realm_id.clone(), key);
    }

    pub fn get(&self, realm_id: &[u8]) -> Option<ServerKey> {
        self.keys.lock().get(realm_id).cloned()
    }
}

/// The client's own cards, keyed by card id.
#[derive(Default)]
pub struct MemClientCredStore {
    cards: Mutex<HashMap<[u8; 32], Card>>,
}

impl MemClientCredStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, card: Card) {
        self.cards.lock().insert(card.card_id, card);
    }

    pub fn get(&self, card_id: &[u8; 32]) -> Option<Card> {
        self.cards.lock().get(card_id).cloned()
    }

    /// Removes a card the client persisted speculatively before a later
    /// enrollment step failed (spec.md §4.9 "the client removes the
    /// persisted card").
    pub fn remove(&self, card_id: &[u8; 32]) {
        self.cards.lock().remove(card_id);
    }

    pub fn len(&self) -> usize {
        self.cards.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The server's enrollment-authorization and issued-card records. Two
/// independent maps under one lock each, since authorizations and cards have
/// unrelated lifecycles and key spaces.
#[derive(Default)]
pub struct MemServerCredStore {
    authorizations: Mutex<HashMap<[u8; 32], EnrollAuthorization>>,
    cards: Mutex<HashMap<[u8; 32], ServerCard>>,
}

impl MemServerCredStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_authorization(&self, auth: EnrollAuthorization) {
        self.authorizations.lock().insert(auth.authorization_id, auth);
    }

    /// Atomically removes and returns the authorization record, so the
    /// caller can re-insert it on a later failure (spec.md §4.9: "atomically
    /// pops the matching authorization record ... must be re-inserted on the
    /// error path").
    pub fn pop_authorization(&self, authorization_id: &[u8; 32]) -> Option<EnrollAuthorization> {
        self.authorizations.lock().remove(authorization_id)
    }

    pub fn restore_authorization(&self, auth: EnrollAuthorization) {
        self.put_authorization(auth);
    }

    pub fn put_card(&self, card: ServerCard) {
        self.cards.lock().insert(card.card_id, card);
    }

    pub fn get_card(&self, card_id: &[u8; 32]) -> Option<ServerCard> {
        self.cards.lock().get(card_id).cloned()
    }
}

/// Checks that a popped authorization's realm matches the realm the client
/// asserted, returning it on success or a policy error with the record
/// re-inserted otherwise (spec.md §4.9, §7 Policy kind).
pub fn check_authorization_realm(
    store: &MemServerCredStore,
    auth: EnrollAuthorization,
    expected_realm_id: &[u8],
) -> Result<EnrollAuthorization> {
    if auth.realm_id != expected_realm_id {
        store.restore_authorization(auth);
        return Err(Error::policy("enroll-authorization realm does not match the client's realm"));
    }
    Ok(auth)
}
