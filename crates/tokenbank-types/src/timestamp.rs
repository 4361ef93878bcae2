//! Unix timestamps for signature deadlines.
//!
//! Both permit standards carry an absolute expiry (`deadline`) as a `uint256`
//! number of seconds since the epoch. [`UnixTimestamp`] is the client-side
//! representation of that value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::SystemTime;

/// Seconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Serialized as a stringified integer so that JSON consumers which parse numbers
/// as doubles never lose precision.
///
/// ```
/// use tokenbank_types::timestamp::UnixTimestamp;
///
/// let deadline = UnixTimestamp::from_secs(1_700_000_000) + 3600;
/// assert_eq!(deadline.as_secs(), 1_700_003_600);
/// assert!(deadline.has_passed(UnixTimestamp::from_secs(1_700_003_600)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnixTimestamp(u64);

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let ts = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?;
        Ok(UnixTimestamp(ts))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs))
    }
}

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("SystemTime before UNIX epoch?!?")
            .as_secs();
        Self(now)
    }

    /// A deadline `window_secs` from now.
    pub fn deadline_in(window_secs: u64) -> Self {
        Self::now() + window_secs
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Whether this deadline is no longer valid at `now`.
    ///
    /// Permit verifiers accept a signature while `block.timestamp <= deadline`,
    /// so a deadline equal to `now` is still valid and only strictly earlier
    /// values count as passed.
    pub fn has_passed(&self, now: UnixTimestamp) -> bool {
        self.0 < now.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1_699_999_999);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1699999999\"");
        let back: UnixTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_rejects_negative_string() {
        let result = serde_json::from_str::<UnixTimestamp>("\"-1\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_deadline_in_is_in_the_future() {
        let now = UnixTimestamp::now();
        let deadline = UnixTimestamp::deadline_in(3600);
        assert!(deadline.as_secs() >= now.as_secs() + 3600);
        assert!(!deadline.has_passed(now));
    }

    #[test]
    fn test_has_passed_boundary() {
        let deadline = UnixTimestamp::from_secs(100);
        assert!(!deadline.has_passed(UnixTimestamp::from_secs(99)));
        assert!(!deadline.has_passed(UnixTimestamp::from_secs(100)));
        assert!(deadline.has_passed(UnixTimestamp::from_secs(101)));
    }

    #[test]
    fn test_add_saturates() {
        let ts = UnixTimestamp::from_secs(u64::MAX - 1) + 10;
        assert_eq!(ts.as_secs(), u64::MAX);
    }
}
