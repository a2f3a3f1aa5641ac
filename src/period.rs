use crate::error::{Result, ShiftError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FORMAT: &str = "%Y%m%d";

/// A stored fact period: `yyyyMMdd` or `yyyyMMdd_yyyyMMdd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactPeriod {
    Instant(NaiveDate),
    Duration { start: NaiveDate, end: NaiveDate },
}

impl FactPeriod {
    pub fn is_instant(&self) -> bool {
        matches!(self, FactPeriod::Instant(_))
    }

    /// The instant itself, or the start of a duration.
    pub fn start(&self) -> NaiveDate {
        match self {
            FactPeriod::Instant(date) => *date,
            FactPeriod::Duration { start, .. } => *start,
        }
    }

    /// The instant itself, or the end of a duration.
    pub fn end(&self) -> NaiveDate {
        match self {
            FactPeriod::Instant(date) => *date,
            FactPeriod::Duration { end, .. } => *end,
        }
    }

    /// Applies `f` to every date of the period.
    pub fn try_map<F>(&self, mut f: F) -> Result<FactPeriod>
    where
        F: FnMut(NaiveDate) -> Result<NaiveDate>,
    {
        Ok(match self {
            FactPeriod::Instant(date) => FactPeriod::Instant(f(*date)?),
            FactPeriod::Duration { start, end } => FactPeriod::Duration {
                start: f(*start)?,
                end: f(*end)?,
            },
        })
    }
}

impl fmt::Display for FactPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactPeriod::Instant(date) => write!(f, "{}", date.format(FORMAT)),
            FactPeriod::Duration { start, end } => {
                write!(f, "{}_{}", start.format(FORMAT), end.format(FORMAT))
            }
        }
    }
}

impl FromStr for FactPeriod {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let parse = |part: &str| {
            if part.len() != 8 {
                return Err(ShiftError::InvalidPeriodString(raw.to_string()));
            }
            NaiveDate::parse_from_str(part, FORMAT)
                .map_err(|_| ShiftError::InvalidPeriodString(raw.to_string()))
        };

        match raw.split_once('_') {
            None => Ok(FactPeriod::Instant(parse(raw)?)),
            Some((start, end)) => Ok(FactPeriod::Duration {
                start: parse(start)?,
                end: parse(end)?,
            }),
        }
    }
}

/// A fact period as read from the mapping store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFactPeriod {
    pub period: FactPeriod,
    /// Fixed periods are never shifted.
    pub is_absolute: bool,
}

impl ParsedFactPeriod {
    pub fn parse(raw: &str, is_absolute: bool) -> Result<Self> {
        Ok(Self {
            period: raw.parse()?,
            is_absolute,
        })
    }
}
