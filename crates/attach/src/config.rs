//! Attachment policy configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy knobs for a [`Bus`](crate::Bus)
///
/// The defaults keep every device forever, matching the behaviour of bus
/// firmware that never forgets a device.
///
/// # Example Configuration
/// ```toml
/// [attach]
/// stale_device_timeout = "30s"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachConfig {
    /// Evict devices that have not announced for this long (None = never)
    #[serde(default, with = "duration_serde")]
    pub stale_device_timeout: Option<Duration>,
}

impl AttachConfig {
    pub fn with_stale_device_timeout(timeout: Duration) -> Self {
        Self {
            stale_device_timeout: Some(timeout),
        }
    }
}

/// Serde adapter for optional durations written as "1h30m", "45s", "250ms"
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    /// Parse a duration made of `<number><unit>` segments (h, m, s, ms)
    ///
    /// A trailing bare number counts as seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim().to_ascii_lowercase();
        let mut total = Duration::ZERO;
        let mut rest = s.as_str();

        while !rest.is_empty() {
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return Err(format!("Invalid duration format: {}", s));
            }
            let value: u64 = rest[..digits]
                .parse()
                .map_err(|_| format!("Invalid number in duration: {}", &rest[..digits]))?;
            rest = &rest[digits..];

            let unit_len = rest.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
            let segment = match &rest[..unit_len] {
                "h" => value.checked_mul(3600).map(Duration::from_secs),
                "m" => value.checked_mul(60).map(Duration::from_secs),
                "s" | "" => Some(Duration::from_secs(value)),
                "ms" => Some(Duration::from_millis(value)),
                unit => return Err(format!("Invalid duration unit: {}", unit)),
            };
            total = segment
                .and_then(|segment| total.checked_add(segment))
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            rest = &rest[unit_len..];
        }

        if total.is_zero() {
            return Err("Duration must be greater than 0".to_string());
        }
        Ok(total)
    }

    pub fn format_duration(d: Duration) -> String {
        let millis = d.subsec_millis();
        let secs = d.as_secs();
        let (hours, mins, secs) = (secs / 3600, (secs % 3600) / 60, secs % 60);

        let mut out = String::new();
        for (value, unit) in [(hours, "h"), (mins, "m"), (secs, "s")] {
            if value > 0 {
                out.push_str(&format!("{}{}", value, unit));
            }
        }
        if millis > 0 {
            out.push_str(&format!("{}ms", millis));
        }
        if out.is_empty() {
            out.push_str("0s");
        }
        out
    }
}
