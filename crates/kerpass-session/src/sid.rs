//! The 48-byte self-authenticating `SessionId` and its keyed factory
//! (spec.md §3 "SessionId", §4.7 "SessionId factory").

use std::time::{Duration, Instant};

use kerpass_crypto::HashAlgorithm;
use kerpass_error::{Error, Result};
use rand::RngCore;
use rand_core::OsRng;
use subtle::ConstantTimeEq;

use crate::clock::Clock;

/// Number of slots the time-sharded store rotates through; also the live
/// window, in ticks, a freshly-issued session id is checked against
/// (spec.md §3 "Time-sharded store").
pub const N_SLOTS: u32 = 16;

const TAG_LEN: usize = 32;
/// 4-byte time field + 8-byte AD + 4-byte counter + 32-byte tag.
pub const SESSION_ID_LEN: usize = 4 + 8 + 4 + TAG_LEN;

/// A 48-byte tagged token: a scaled-time counter, an application-data
/// field, and a keyed authentication tag over both (spec.md §3).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        SessionId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }

    /// The encoded scaled-time counter (the slot key), mod 2^32.
    pub fn t(&self) -> u32 {
        u32::from_be_bytes(self.0[0..4].try_into().expect("fixed-size slice"))
    }

    /// The application-data field minted alongside this session id.
    pub fn ad(&self) -> u64 {
        u64::from_be_bytes(self.0[4..12].try_into().expect("fixed-size slice"))
    }

    fn tagged_prefix(&self) -> &[u8] {
        &self.0[0..12 + 4]
    }

    fn tag(&self) -> &[u8] {
        &self.0[16..SESSION_ID_LEN]
    }

    /// Which ring-buffer slot (spec.md §4.7) this id's time counter hashes
    /// to.
    pub fn slot_index(&self) -> usize {
        (self.t() % N_SLOTS) as usize
    }
}

/// Mints and verifies [`SessionId`]s under a single root secret
/// (spec.md §4.7, §5 "Session id factory").
pub struct SessionIdFactory {
    clock: Clock,
    root_key: [u8; 32],
}

impl SessionIdFactory {
    /// Builds a factory whose sessions live for `lifetime`, split across
    /// [`N_SLOTS`] equal ticks. Fails if `lifetime` is too short to divide
    /// into at least one nanosecond per tick.
    pub fn new(lifetime: Duration) -> Result<Self> {
        Self::starting_at(lifetime, Instant::now())
    }

    /// As [`Self::new`], but the underlying clock starts at an explicit
    /// instant, for deterministic tests.
    pub fn starting_at(lifetime: Duration, t0: Instant) -> Result<Self> {
        let step_nanos = lifetime.as_nanos() / N_SLOTS as u128;
        if step_nanos == 0 {
            return Err(Error::validation(format!(
                "lifetime {lifetime:?} is too short to divide into {N_SLOTS} ticks"
            )));
        }
        let step = Duration::from_nanos(step_nanos.min(u64::MAX as u128) as u64);
        let clock = Clock::starting_at(step, t0)?;
        let mut root_key = [0u8; 32];
        OsRng.fill_bytes(&mut root_key);
        Ok(SessionIdFactory { clock, root_key })
    }

    /// `New(ad) -> Sid` (spec.md §4.7).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn new_session(&self, now: Instant, ad: u64) -> SessionId {
        let t = self.clock.tick_at(now) as u32;
        let mut counter = [0u8; 4];
        OsRng.fill_bytes(&mut counter);
        self.assemble(t, ad, counter)
    }

    fn assemble(&self, t: u32, ad: u64, counter: [u8; 4]) -> SessionId {
        let mut buf = [0u8; SESSION_ID_LEN];
        buf[0..4].copy_from_slice(&t.to_be_bytes());
        buf[4..12].copy_from_slice(&ad.to_be_bytes());
        buf[12..16].copy_from_slice(&counter);
        let tag = HashAlgorithm::Sha256.hmac(&self.root_key, &[&buf[0..16]]);
        buf[16..SESSION_ID_LEN].copy_from_slice(&tag);
        SessionId(buf)
    }

    /// `Check(sid)`: verifies the tag in constant time, then that the
    /// encoded time is within the live window of `now` (spec.md §4.7).
    pub fn check(&self, now: Instant, sid: &SessionId) -> Result<()> {
        let expected_tag = HashAlgorithm::Sha256.hmac(&self.root_key, &[sid.tagged_prefix()]);
        if expected_tag.ct_eq(sid.tag()).unwrap_u8() != 1 {
            return Err(Error::authentication("session id failed tag verification"));
        }

        let now_tick = self.clock.tick_at(now);
        let sid_tick = sid.t() as u64;
        if sid_tick > now_tick || now_tick - sid_tick >= N_SLOTS as u64 {
            return Err(Error::expiry("session id's encoded time is outside the live window"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_lifetime_shorter_than_n_slots_ticks() {
        assert!(SessionIdFactory::new(Duration::from_nanos(N_SLOTS as u64 - 1)).is_err());
    }

    #[test]
    fn tampering_any_byte_fails_check() {
        let t0 = Instant::now();
        let factory = SessionIdFactory::starting_at(Duration::from_secs(32), t0).unwrap();
        let sid = factory.new_session(t0, 42);
        assert!(factory.check(t0, &sid).is_ok());

        for i in 0..SESSION_ID_LEN {
            let mut tampered = *sid.as_bytes();
            tampered[i] ^= 0x01;
            let tampered = SessionId::from_bytes(tampered);
            let err = factory.check(t0, &tampered).unwrap_err();
            assert!(
                err.is_authentication() || err.is_expiry(),
                "byte {i} tamper produced unexpected error kind"
            );
        }
    }

    #[test]
    fn check_succeeds_just_before_lifetime_and_fails_just_after() {
        let t0 = Instant::now();
        let factory = SessionIdFactory::starting_at(Duration::from_secs(32), t0).unwrap();
        let sid = factory.new_session(t0, 7);

        let just_before = t0 + Duration::from_nanos(31_999_999_999);
        assert!(factory.check(just_before, &sid).is_ok());

        let just_after = t0 + Duration::from_nanos(32_000_000_001);
        let err = factory.check(just_after, &sid).unwrap_err();
        assert!(err.is_expiry());
    }

    #[test]
    fn ad_round_trips() {
        let t0 = Instant::now();
        let factory = SessionIdFactory::starting_at(Duration::from_secs(32), t0).unwrap();
        let sid = factory.new_session(t0, 0xDEAD_BEEF_u64);
        assert_eq!(sid.ad(), 0xDEAD_BEEF_u64);
    }
}
