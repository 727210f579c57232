use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Default clip lifetime when the caller gives no (usable) TTL.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Upper bound on an explicit TTL. Anything beyond this is treated as
/// malformed and falls back to the default.
const MAX_TTL_DAYS: i64 = 365;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtlUnit {
    Minute,
    Hour,
    Day,
}

/// A relative lifetime request (`10m`, `2h`, `3d`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlSpec {
    pub value: u32,
    pub unit: TtlUnit,
}

impl TtlSpec {
    /// Parse the chat-argument form: a positive integer followed by
    /// `m`/`h`/`d`. Returns `None` for anything else; the expiry policy
    /// maps `None` to the default lifetime.
    pub fn parse(s: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^(\d{1,9})([mhd])$").expect("ttl regex"));

        let caps = re.captures(s.trim())?;
        let value: u32 = caps[1].parse().ok()?;
        if value == 0 {
            return None;
        }
        let unit = match &caps[2] {
            "m" => TtlUnit::Minute,
            "h" => TtlUnit::Hour,
            _ => TtlUnit::Day,
        };
        Some(Self { value, unit })
    }

    fn duration(&self) -> Duration {
        let v = i64::from(self.value);
        match self.unit {
            TtlUnit::Minute => Duration::minutes(v),
            TtlUnit::Hour => Duration::hours(v),
            TtlUnit::Day => Duration::days(v),
        }
    }
}

/// Compute the absolute expiry instant for a clip created at `created_at`.
///
/// Policy: a save never fails because of its TTL. Absent, zero-valued, or
/// out-of-range specs all degrade to the 7-day default instead of erroring.
/// The result is always strictly after `created_at`.
pub fn expires_at(created_at: DateTime<Utc>, ttl: Option<TtlSpec>) -> DateTime<Utc> {
    let default = Duration::days(DEFAULT_TTL_DAYS);
    let dur = match ttl {
        Some(spec) => {
            let d = spec.duration();
            if d <= Duration::zero() || d > Duration::days(MAX_TTL_DAYS) {
                default
            } else {
                d
            }
        }
        None => default,
    };
    created_at + dur
}
