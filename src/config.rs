//! Service configuration helpers
//!
//! Value types parsed from the command line plus the human duration parser
//! used for the refresh timeout.

use std::time::Duration;

use clap::ValueEnum;

use crate::error::{Error, Result};

/// What the query facade does when the cache can't answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryStrategy {
    /// Query the record store on a miss or a cache error
    Fallback,
    /// Return empty results on a miss or a cache error
    Degrade,
    /// Query the record store on a miss, return empty on a cache error
    DegradeMissFallback,
}

impl std::fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStrategy::Fallback => write!(f, "fallback"),
            QueryStrategy::Degrade => write!(f, "degrade"),
            QueryStrategy::DegradeMissFallback => write!(f, "degrade-miss-fallback"),
        }
    }
}

/// Where the control and buffer regions live
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KvBackend {
    /// Process-local maps; contents are lost on restart
    Memory,
    /// Three databases on a Redis server (requires the `redis` feature)
    Redis,
}

impl std::fmt::Display for KvBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvBackend::Memory => write!(f, "memory"),
            KvBackend::Redis => write!(f, "redis"),
        }
    }
}

/// Parse a Go-style duration string (e.g., "10m", "1h30m", "500ms").
///
/// A trailing bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total = Duration::ZERO;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;

        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_alphabetic()) {
            unit.push(c.to_ascii_lowercase());
            chars.next();
        }

        let out_of_range = || Error::DurationParse(format!("duration out of range: {}", s));
        let secs = |factor: u64| {
            value
                .checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(out_of_range)
        };
        let part = match unit.as_str() {
            "" | "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            "m" => secs(60)?,
            "h" => secs(3600)?,
            "d" => secs(86400)?,
            other => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit: {}",
                    other
                )))
            }
        };
        total = total.checked_add(part).ok_or_else(out_of_range)?;
    }

    if total.is_zero() {
        return Err(Error::DurationParse("duration must be positive".to_string()));
    }

    Ok(total)
}
