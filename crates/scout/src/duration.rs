//! Serde codec for human readable durations.
//!
//! Accepts either a plain number, read as nanoseconds, or a string such as
//! `"5s"`, `"1m30s"` or `"250ms"`. Always serialises to the string form.
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct Probe {
//!     #[serde(with = "scout::duration")]
//!     interval: std::time::Duration,
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

use crate::error::Error;

/// Parse a human readable duration string.
pub fn parse(value: &str) -> Result<Duration, Error> {
    humantime::parse_duration(value.trim())
        .map_err(|e| Error::InvalidDuration(value.to_string(), e.to_string()))
}

/// Render a duration the way it is written back to config files.
pub fn format(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(*duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

struct DurationVisitor;

impl Visitor<'_> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number of nanoseconds or a duration string like \"5s\"")
    }

    fn visit_u64<E: de::Error>(self, nanos: u64) -> Result<Duration, E> {
        Ok(Duration::from_nanos(nanos))
    }

    fn visit_i64<E: de::Error>(self, nanos: i64) -> Result<Duration, E> {
        u64::try_from(nanos)
            .map(Duration::from_nanos)
            .map_err(|_| E::custom(format!("negative duration: {nanos}")))
    }

    fn visit_f64<E: de::Error>(self, nanos: f64) -> Result<Duration, E> {
        if !nanos.is_finite() || nanos < 0.0 {
            return Err(E::custom(format!("invalid duration: {nanos}")));
        }
        Ok(Duration::from_nanos(nanos as u64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
        parse(value).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        value: Duration,
    }

    #[test]
    fn test_number_is_nanoseconds() {
        let w: Wrapper = serde_json::from_str(r#"{"value": 5000000000}"#).unwrap();
        assert_eq!(w.value, Duration::from_secs(5));

        let w: Wrapper = serde_json::from_str(r#"{"value": 1500.0}"#).unwrap();
        assert_eq!(w.value, Duration::from_nanos(1500));
    }

    #[test]
    fn test_human_readable_strings() {
        let w: Wrapper = serde_json::from_str(r#"{"value": "1m30s"}"#).unwrap();
        assert_eq!(w.value, Duration::from_secs(90));

        let w: Wrapper = serde_json::from_str(r#"{"value": "250ms"}"#).unwrap();
        assert_eq!(w.value, Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": "soon"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": -4}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": true}"#).is_err());
        assert!(matches!(parse("often"), Err(Error::InvalidDuration(..))));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Wrapper { value: Duration::from_secs(90) }).unwrap();
        assert_eq!(json, r#"{"value":"1m 30s"}"#);
    }
}
