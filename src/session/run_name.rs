//! Structured run folder names: `<commander>_<YYYY-MM-DD_HH-MM-SS>`.
//!
//! Names are parsed once when the archive is enumerated and formatted once
//! when a run is minted; nothing downstream splits strings.

use crate::report::UNKNOWN_COMMANDER;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Length of the `YYYY-MM-DD_HH-MM-SS` stamp.
const STAMP_LEN: usize = 19;

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Cache the local UTC offset. Must run before any other thread is spawned,
/// otherwise the offset cannot be determined and run names fall back to UTC.
pub fn init_local_offset() {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let _ = LOCAL_OFFSET.set(offset);
}

/// Current wall-clock time in the cached local offset.
pub fn local_now() -> PrimitiveDateTime {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    let now = OffsetDateTime::now_utc().to_offset(offset);
    PrimitiveDateTime::new(now.date(), now.time())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunNameError {
    #[error("run name '{0}' has no timestamp")]
    MissingStamp(String),
    #[error("run name '{0}' has an invalid timestamp")]
    BadStamp(String),
    #[error("run name '{0}' has no commander")]
    MissingCommander(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunName {
    commander: String,
    started: PrimitiveDateTime,
}

impl RunName {
    /// Build a name, dropping sub-second precision and characters that are
    /// not valid in folder names.
    pub fn new(commander: &str, started: PrimitiveDateTime) -> Self {
        let cleaned: String = commander
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
                c if c.is_control() => '-',
                c => c,
            })
            .collect();
        let commander = if cleaned.is_empty() {
            UNKNOWN_COMMANDER.to_string()
        } else {
            cleaned
        };
        Self {
            commander,
            started: started.replace_nanosecond(0).unwrap_or(started),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, RunNameError> {
        if raw.len() < STAMP_LEN + 1 {
            return Err(RunNameError::MissingStamp(raw.to_string()));
        }
        let split = raw.len() - STAMP_LEN - 1;
        let (commander, stamp) = match (raw.get(..split), raw.get(split..)) {
            (Some(c), Some(s)) if s.starts_with('_') => (c, &s[1..]),
            _ => return Err(RunNameError::MissingStamp(raw.to_string())),
        };
        if commander.is_empty() {
            return Err(RunNameError::MissingCommander(raw.to_string()));
        }
        let started = PrimitiveDateTime::parse(
            stamp,
            format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]"),
        )
        .map_err(|_| RunNameError::BadStamp(raw.to_string()))?;
        Ok(Self {
            commander: commander.to_string(),
            started,
        })
    }

    pub fn commander(&self) -> &str {
        &self.commander
    }

    /// Character name part of an account (`Name.1234` -> `Name`).
    pub fn short_commander(&self) -> &str {
        self.commander
            .split('.')
            .next()
            .unwrap_or(self.commander.as_str())
    }

    pub fn started(&self) -> PrimitiveDateTime {
        self.started
    }

    pub fn stamp(&self) -> String {
        self.started
            .format(format_description!(
                "[year]-[month]-[day]_[hour]-[minute]-[second]"
            ))
            .unwrap_or_default()
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.commander, self.stamp())
    }
}

impl FromStr for RunName {
    type Err = RunNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunName::parse(s)
    }
}
