//! Human-readable duration strings (`"1m"`, `"2h30m"`, `"500ms"`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::CoreError;

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes), `Xs` (seconds)
/// and `Xms` (milliseconds). Components can be combined: "2h30m", "1m30s", "1s500ms".
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, CoreError> {
    let trimmed = s.trim();
    let invalid = || CoreError::InvalidDuration(s.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut unit_buf = String::new();
    let mut found_unit = false;

    let mut flush = |num: &mut String, unit: &mut String| -> Result<(), CoreError> {
        let n: u64 = num.parse().map_err(|_| invalid())?;
        let scale = match unit.as_str() {
            "d" => 86_400_000,
            "h" => 3_600_000,
            "m" => 60_000,
            "s" => 1_000,
            "ms" => 1,
            _ => return Err(invalid()),
        };
        total_ms = n
            .checked_mul(scale)
            .and_then(|v| total_ms.checked_add(v))
            .ok_or_else(invalid)?;
        num.clear();
        unit.clear();
        Ok(())
    };

    for ch in trimmed.chars() {
        if ch.is_ascii_digit() {
            if !unit_buf.is_empty() {
                flush(&mut num_buf, &mut unit_buf)?;
            }
            num_buf.push(ch);
        } else if ch.is_ascii_alphabetic() {
            if num_buf.is_empty() {
                return Err(invalid());
            }
            unit_buf.push(ch);
            found_unit = true;
        } else {
            return Err(invalid());
        }
    }

    if !unit_buf.is_empty() {
        flush(&mut num_buf, &mut unit_buf)?;
    } else if !num_buf.is_empty() {
        // Trailing number after a unit is ambiguous ("30m15").
        if found_unit {
            return Err(invalid());
        }
        flush(&mut num_buf, &mut "s".to_string())?;
    }

    Ok(Duration::from_millis(total_ms))
}

/// Format a duration in the shortest form [`parse_duration`] accepts.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }
    if ms % 1_000 != 0 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1_000;
    if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Serde adapter for duration-string fields: `#[serde(with = "weir_core::duration::serde_str")]`.
pub mod serde_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
