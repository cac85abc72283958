use std::time::Duration as StdDuration;

use serde::{Deserialize, Deserializer};

/// A wall-clock duration parsed from the policy file's `"7d"` / `"12h"` / `"30m"`
/// shorthand, or from a bare integer number of minutes.
///
/// Only a single unit is accepted per string — `"1d12h"` is not supported,
/// matching `parse_duration` in the source this spec was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(StdDuration);

impl Duration {
    pub fn from_std(d: StdDuration) -> Self {
        Duration(d)
    }

    pub fn as_std(&self) -> StdDuration {
        self.0
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Duration(StdDuration::from_secs(minutes * 60))
    }
}

/// Parse a duration string like `"7d"`, `"12h"`, `"30m"` into a [`Duration`].
///
/// Supported units: `d` (days), `h` (hours), `m` (minutes). Exactly one
/// leading integer followed by exactly one unit letter is accepted; anything
/// else is a malformed duration and fails the whole policy load (spec §4.1).
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration string");
    }

    let unit_pos = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| anyhow::anyhow!("duration '{s}' is missing a unit (expected d/h/m)"))?;

    let (value_part, unit_part) = s.split_at(unit_pos);
    if unit_part.len() != 1 || value_part.is_empty() {
        anyhow::bail!("invalid duration format: '{s}'");
    }

    let value: u64 = value_part
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration value in '{s}'"))?;

    let secs = match unit_part {
        "d" => value * 86_400,
        "h" => value * 3_600,
        "m" => value * 60,
        other => anyhow::bail!("invalid duration unit '{other}' in '{s}' (expected d/h/m)"),
    };

    Ok(Duration(StdDuration::from_secs(secs)))
}

/// Render a duration back to its canonical shorthand, picking the largest
/// unit that divides it evenly (days, then hours, then minutes).
pub fn format_duration(d: Duration) -> String {
    let secs = d.0.as_secs();
    if secs != 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs != 0 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else {
        format!("{}m", secs / 60)
    }
}

/// Deserialize either a duration shorthand string or a bare integer number of
/// minutes (spec §6: "numeric values interpreted as the unit the schema
/// specifies").
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Minutes(u64),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        Repr::Minutes(m) => Ok(Duration::from_minutes(m)),
    }
}

pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Minutes(u64),
    }

    let repr: Option<Repr> = Option::deserialize(deserializer)?;
    match repr {
        None => Ok(None),
        Some(Repr::Text(s)) => parse_duration(&s).map(Some).map_err(serde::de::Error::custom),
        Some(Repr::Minutes(m)) => Ok(Some(Duration::from_minutes(m))),
    }
}
