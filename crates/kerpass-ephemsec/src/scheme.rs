//! EPHEMSEC scheme names and the pseudo-time window (spec.md §4.5).

use kerpass_crypto::{Curve, HashAlgorithm};
use kerpass_error::{Error, Result};

/// Which Diffie-Hellman shares a scheme mixes into its derivation, in the
/// order the shared material `Z` concatenates them: ephemeral-then-static.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kx {
    /// One ephemeral-ephemeral DH.
    E1S1,
    /// One ephemeral DH plus one static DH.
    E1S2,
    /// Two ephemeral DHs plus... (scheme-defined combination of two shares).
    E2S2,
}

impl Kx {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "E1S1" => Ok(Kx::E1S1),
            "E1S2" => Ok(Kx::E1S2),
            "E2S2" => Ok(Kx::E2S2),
            other => Err(Error::validation(format!("unknown key-exchange mode {other}"))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Kx::E1S1 => "E1S1",
            Kx::E1S2 => "E1S2",
            Kx::E2S2 => "E2S2",
        }
    }

    /// Whether a realm static public key (and certificate) must be loaded
    /// alongside the ephemeral share (spec.md §4.10).
    pub fn needs_realm_static(&self) -> bool {
        matches!(self, Kx::E1S2 | Kx::E2S2)
    }
}

/// A parsed `Kerpass_<Hash>_<Curve>_<Kx>_T<T>_B<B>_P<P>_S<S>` scheme name
/// (spec.md §4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheme {
    pub hash: HashAlgorithm,
    pub curve: Curve,
    pub kx: Kx,
    /// The pseudo-time step, in seconds.
    pub t: u64,
    /// The digit base: 10, 16, 32, or 256 (OTK mode).
    pub b: u32,
    /// Digit count (OTP mode) or output byte length (OTK mode, `b == 256`).
    pub p: u32,
    /// Whether a trailing synchronization digit is appended.
    pub s: bool,
}

const VALID_BASES: [u32; 4] = [10, 16, 32, 256];

impl Scheme {
    /// Parses the canonical underscore-separated grammar, falling back to
    /// the legacy concatenated `T<T>B<B>P<P>S<S>` suffix the source's older
    /// test vectors use (spec.md §9).
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        match parts.as_slice() {
            [kerpass, hash, curve, kx, t, b, p, s] => {
                Self::assemble(kerpass, hash, curve, kx, t, b, p, s)
            }
            [kerpass, hash, curve, kx_and_params] => {
                let (kx, t, b, p, s) = split_legacy_params(kx_and_params)?;
                Self::assemble(kerpass, hash, curve, &kx, &t, &b, &p, &s)
            }
            _ => Err(Error::validation(format!("malformed scheme name {name:?}"))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        kerpass: &str,
        hash: &str,
        curve: &str,
        kx: &str,
        t: &str,
        b: &str,
        p: &str,
        s: &str,
    ) -> Result<Self> {
        if kerpass != "Kerpass" {
            return Err(Error::validation("scheme name must start with Kerpass_"));
        }
        let t = strip_digit_field(t, 'T')?;
        let b = strip_digit_field(b, 'B')?;
        let p = strip_digit_field(p, 'P')?;
        let s = strip_digit_field(s, 'S')?;

        if !VALID_BASES.contains(&b) {
            return Err(Error::validation(format!("unsupported base B{b}")));
        }
        if s > 1 {
            return Err(Error::validation(format!("S must be 0 or 1, got {s}")));
        }
        if t == 0 {
            return Err(Error::validation("T must be a positive number of seconds"));
        }
        if p == 0 {
            return Err(Error::validation("P must be positive"));
        }
        let max_bits = match b {
            10 => 48.0,
            256 => 512.0,
            _ => 64.0,
        };
        let bits = p as f64 * (b as f64).log2();
        if bits > max_bits + 1e-9 {
            return Err(Error::validation(format!(
                "P*log2(B) = {bits:.1} exceeds the {max_bits:.0}-bit entropy budget for base {b}"
            )));
        }

        Ok(Scheme {
            hash: HashAlgorithm::from_name(hash)?,
            curve: Curve::from_name(curve)?,
            kx: Kx::from_name(kx)?,
            t: t as u64,
            b,
            p,
            s: s == 1,
        })
    }

    pub fn name(&self) -> String {
        format!(
            "Kerpass_{}_{}_{}_T{}_B{}_P{}_S{}",
            self.hash.name(),
            self.curve.name(),
            self.kx.name(),
            self.t,
            self.b,
            self.p,
            u8::from(self.s)
        )
    }

    pub fn is_otk(&self) -> bool {
        self.b == 256
    }

    /// `Time(unix_seconds) -> (pseudo_time, sync_hint)` (spec.md §4.5).
    pub fn time(&self, unix_seconds: u64) -> (u64, u32) {
        let pseudo_time = ((unix_seconds as f64) / (self.t as f64)).round() as u64;
        let sync_hint = (pseudo_time % self.b as u64) as u32;
        (pseudo_time, sync_hint)
    }

    /// `SyncTime(reference_unix_seconds, sync_hint) -> pseudo_time`: the
    /// candidate among the reference's neighboring windows whose low-order
    /// digits match `sync_hint`, nearest to the reference (spec.md §4.5).
    pub fn sync_time(&self, reference_unix_seconds: u64, sync_hint: u32) -> u64 {
        let (reftime, _) = self.time(reference_unix_seconds);
        let b = self.b as i64;
        let q = reftime as i64 / b;
        let sync = sync_hint as i64;

        let candidates = [(q - 1) * b + sync, q * b + sync, (q + 1) * b + sync];
        candidates
            .into_iter()
            .filter(|c| *c >= 0)
            .min_by_key(|c| (*c - reftime as i64).abs())
            .map(|c| c as u64)
            .unwrap_or(reftime)
    }
}

fn strip_digit_field(field: &str, letter: char) -> Result<u32> {
    let digits = field
        .strip_prefix(letter)
        .ok_or_else(|| Error::validation(format!("expected {letter}<digits>, got {field:?}")))?;
    digits
        .parse()
        .map_err(|_| Error::validation(format!("expected {letter}<digits>, got {field:?}")))
}

/// Splits the legacy concatenated `<Kx>T<T>B<B>P<P>S<S>` token into its five
/// sub-fields by scanning for the `T`/`B`/`P`/`S` letter boundaries.
fn split_legacy_params(token: &str) -> Result<(String, String, String, String, String)> {
    let t_pos = token
        .find('T')
        .ok_or_else(|| Error::validation(format!("legacy scheme suffix missing T: {token:?}")))?;
    let (kx, rest) = token.split_at(t_pos);

    let b_pos = rest
        .find('B')
        .ok_or_else(|| Error::validation(format!("legacy scheme suffix missing B: {token:?}")))?;
    let (t_field, rest) = rest.split_at(b_pos);

    let p_pos = rest
        .find('P')
        .ok_or_else(|| Error::validation(format!("legacy scheme suffix missing P: {token:?}")))?;
    let (b_field, rest) = rest.split_at(p_pos);

    let s_pos = rest
        .find('S')
        .ok_or_else(|| Error::validation(format!("legacy scheme suffix missing S: {token:?}")))?;
    let (p_field, s_field) = rest.split_at(s_pos);

    Ok((
        kx.to_string(),
        t_field.to_string(),
        b_field.to_string(),
        p_field.to_string(),
        s_field.to_string(),
    ))
}
