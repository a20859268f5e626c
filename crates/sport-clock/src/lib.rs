// sport-clock: conversion between sport-specific game clock readings and a
// single monotonic "elapsed seconds" scale.
//
// The supported sports are kept as *data* (`SPORTS`), not as branches in the
// conversion logic — the arithmetic below is identical for every `down`
// clock and identical for every `up` clock; only the table entry differs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a sport's clock counts down to zero within a period (basketball,
/// football, hockey) or counts up from zero (soccer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

/// Static definition of one supported sport's clock shape.
#[derive(Debug, Clone, Copy)]
pub struct SportDef {
    pub tag: &'static str,
    pub periods: u32,
    pub period_minutes: u32,
    pub direction: Direction,
    /// Upper minute bound within a period. For `down` clocks this equals
    /// `period_minutes`. For `up` clocks this allows stoppage overflow
    /// (e.g. soccer's 45-minute half allows up to 59 displayed minutes).
    pub max_minute: u32,
}

/// The closed set of sports this library understands.
pub const SPORTS: &[SportDef] = &[
    SportDef {
        tag: "basketball",
        periods: 4,
        period_minutes: 12,
        direction: Direction::Down,
        max_minute: 12,
    },
    SportDef {
        tag: "football",
        periods: 4,
        period_minutes: 15,
        direction: Direction::Down,
        max_minute: 15,
    },
    SportDef {
        tag: "hockey",
        periods: 3,
        period_minutes: 20,
        direction: Direction::Down,
        max_minute: 20,
    },
    SportDef {
        tag: "soccer",
        periods: 2,
        period_minutes: 45,
        direction: Direction::Up,
        max_minute: 59,
    },
];

/// A sport recognised by the clock library. Indexes into [`SPORTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Basketball,
    Football,
    Hockey,
    Soccer,
}

impl Sport {
    pub fn def(self) -> &'static SportDef {
        let tag = self.tag();
        SPORTS
            .iter()
            .find(|d| d.tag == tag)
            .expect("every Sport variant has a SPORTS entry")
    }

    pub fn tag(self) -> &'static str {
        match self {
            Sport::Basketball => "basketball",
            Sport::Football => "football",
            Sport::Hockey => "hockey",
            Sport::Soccer => "soccer",
        }
    }

    /// Case-insensitive lookup by sport tag, e.g. from a room's configured
    /// sport or a client-supplied `sport` field.
    pub fn from_tag(tag: &str) -> Option<Sport> {
        match tag.to_ascii_lowercase().as_str() {
            "basketball" => Some(Sport::Basketball),
            "football" => Some(Sport::Football),
            "hockey" => Some(Sport::Hockey),
            "soccer" => Some(Sport::Soccer),
            _ => None,
        }
    }
}

/// A validated point on a sport's game clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTime {
    pub period: u32,
    pub minutes: u32,
    pub seconds: u32,
}

/// Result of [`from_elapsed`]: the canonical `(period, minutes, seconds)`
/// plus a human-facing display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedBreakdown {
    pub period: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTime(pub String);

impl fmt::Display for InvalidTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvalidTime {}

/// Validate a `(period, minutes, seconds)` reading against a sport's rules.
///
/// For `down` sports: `minutes` in `[0, period_minutes]`, and if
/// `minutes == period_minutes` then `seconds == 0` (the clock cannot read
/// e.g. "12:05" in a 12-minute period — it reads "12:00" only at the very
/// start). For `up` sports: `minutes` in `[0, max_minute]`.
pub fn validate(sport: Sport, period: u32, minutes: u32, seconds: u32) -> Result<(), InvalidTime> {
    let def = sport.def();
    if period < 1 || period > def.periods {
        return Err(InvalidTime(format!(
            "{} has {} period(s); got period {}",
            def.tag, def.periods, period
        )));
    }
    if seconds > 59 {
        return Err(InvalidTime(format!("seconds must be 0-59, got {seconds}")));
    }
    match def.direction {
        Direction::Down => {
            if minutes > def.period_minutes {
                return Err(InvalidTime(format!(
                    "{} periods run {} minutes; got minutes {}",
                    def.tag, def.period_minutes, minutes
                )));
            }
            if minutes == def.period_minutes && seconds != 0 {
                return Err(InvalidTime(format!(
                    "clock cannot read {minutes}:{seconds:02} in a {}-minute period",
                    def.period_minutes
                )));
            }
        }
        Direction::Up => {
            if minutes > def.max_minute {
                return Err(InvalidTime(format!(
                    "{} allows up to {} minutes per period; got minutes {}",
                    def.tag, def.max_minute, minutes
                )));
            }
        }
    }
    Ok(())
}

/// Convert a validated `(period, minutes, seconds)` reading to elapsed
/// seconds since the start of the contest.
pub fn to_elapsed(sport: Sport, period: u32, minutes: u32, seconds: u32) -> Result<u64, InvalidTime> {
    validate(sport, period, minutes, seconds)?;
    let def = sport.def();
    let period_len = u64::from(def.period_minutes) * 60;
    let completed_periods = u64::from(period - 1) * period_len;
    let within_period = match def.direction {
        Direction::Down => period_len - (u64::from(minutes) * 60 + u64::from(seconds)),
        Direction::Up => u64::from(minutes) * 60 + u64::from(seconds),
    };
    Ok(completed_periods + within_period)
}

/// Inverse of [`to_elapsed`]: map elapsed seconds back to a `(period,
/// minutes, seconds)` reading, clamping to `[0, periods * period_minutes *
/// 60]`.
pub fn from_elapsed(sport: Sport, elapsed_secs: u64) -> ElapsedBreakdown {
    let def = sport.def();
    let period_len = u64::from(def.period_minutes) * 60;
    // The final period's clock may run past `period_len` (up-clock stoppage
    // overflow up to `max_minute`); earlier periods cannot, so only the last
    // period's span needs widening when computing the overall clamp.
    let last_period_span = match def.direction {
        Direction::Down => period_len,
        Direction::Up => u64::from(def.max_minute) * 60 + 59,
    };
    let periods_before_last = u64::from(def.periods - 1);
    let last_period_start = period_len * periods_before_last;
    let total = last_period_start + last_period_span;
    let clamped = elapsed_secs.min(total);

    let (mut period_index, mut within_period) = if clamped >= last_period_start {
        (periods_before_last, clamped - last_period_start)
    } else {
        (clamped / period_len, clamped % period_len)
    };
    if within_period == 0 && period_index > 0 {
        // An exact period boundary belongs to the end of the previous
        // period ("0:00 remaining"), not the start of the next one, so
        // to_elapsed/from_elapsed round-trip for every input including
        // period starts/ends.
        period_index -= 1;
        within_period = period_len;
    }
    let period = period_index as u32 + 1;

    let (minutes, seconds) = match def.direction {
        Direction::Down => {
            let remaining = period_len - within_period;
            ((remaining / 60) as u32, (remaining % 60) as u32)
        }
        Direction::Up => ((within_period / 60) as u32, (within_period % 60) as u32),
    };

    let display = match def.direction {
        Direction::Down => format!("Q{period} {minutes}:{seconds:02}"),
        Direction::Up => format!("H{period} {minutes}:{seconds:02}"),
    };

    ElapsedBreakdown {
        period,
        minutes,
        seconds,
        display,
    }
}
