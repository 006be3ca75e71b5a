//! Birthday parsing with optional years.
//!
//! Birthdays are stored as `YYYY-MM-DD`. A missing year is written as
//! [`UNKNOWN_BIRTH_YEAR`] so month/day-only dates still fit the same shape.

use once_cell::sync::Lazy;
use regex::Regex;

/// Year written into birthdays whose year is unknown.
pub const UNKNOWN_BIRTH_YEAR: u16 = 1604;

static FULL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid full date regex"));
static NO_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-{0,2}(\d{1,2})-(\d{1,2})$").expect("valid month-day regex"));

/// A calendar birthday whose year may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthDate {
    pub year: Option<u16>,
    pub month: u8,
    pub day: u8,
}

impl BirthDate {
    pub fn new(year: Option<u16>, month: u8, day: u8) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        let year = year.filter(|year| *year != 0 && *year != UNKNOWN_BIRTH_YEAR);
        Some(Self { year, month, day })
    }

    /// Parses `YYYY-MM-DD`, `--MM-DD` or `MM-DD`. The sentinel year reads as unknown.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(caps) = FULL_DATE_RE.captures(value) {
            let year = caps[1].parse::<u16>().ok()?;
            let month = caps[2].parse::<u8>().ok()?;
            let day = caps[3].parse::<u8>().ok()?;
            return Self::new(Some(year), month, day);
        }
        if let Some(caps) = NO_YEAR_RE.captures(value) {
            let month = caps[1].parse::<u8>().ok()?;
            let day = caps[2].parse::<u8>().ok()?;
            return Self::new(None, month, day);
        }
        None
    }

    /// Canonical `YYYY-MM-DD`, using the sentinel for an unknown year.
    pub fn to_storage_string(self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.year.unwrap_or(UNKNOWN_BIRTH_YEAR),
            self.month,
            self.day
        )
    }

    /// Same month and day, and the same year when both years are known.
    pub fn is_same_birthday(self, other: BirthDate) -> bool {
        if self.month != other.month || self.day != other.day {
            return false;
        }
        match (self.year, other.year) {
            (Some(left), Some(right)) => left == right,
            _ => true,
        }
    }
}
