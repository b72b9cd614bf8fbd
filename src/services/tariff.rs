//! Tempo colors, red-day eligibility and tariff history parsing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::helpers::parse_iso_date;
use crate::services::season::{is_saturday, is_winter};
use crate::store::models::TariffRecord;

/// Tariff color of a day, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    White,
    Red,
}

impl Color {
    pub const ALL: [Color; 3] = [Color::Blue, Color::White, Color::Red];

    pub fn index(self) -> usize {
        match self {
            Color::Blue => 0,
            Color::White => 1,
            Color::Red => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::White => "white",
            Color::Red => "red",
        }
    }

    /// Parse a color from the source vocabularies.
    ///
    /// Accepts the French labels used by EDF (`bleu`, `blanc`, `rouge`), the
    /// English names, and longer labels containing either (`"Tempo Bleu"`).
    /// Anything else is rejected rather than guessed.
    pub fn from_label(label: &str) -> Option<Color> {
        let lower = label.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("bleu") || lower.contains("blue") {
            Some(Color::Blue)
        } else if lower.contains("blanc") || lower.contains("white") {
            Some(Color::White)
        } else if lower.contains("rouge") || lower.contains("red") {
            Some(Color::Red)
        } else {
            None
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized tariff color '{0}'")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_label(s).ok_or_else(|| UnknownColor(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which red days are refused by quota bookkeeping and training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedPolicy {
    /// Red is only valid from November through March.
    pub exclude_out_of_winter: bool,
    /// Red is never valid on a Saturday.
    pub exclude_saturday: bool,
}

impl Default for RedPolicy {
    fn default() -> Self {
        Self {
            exclude_out_of_winter: true,
            exclude_saturday: true,
        }
    }
}

/// Why a red day was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedViolation {
    OutOfWinter,
    Saturday,
}

impl RedPolicy {
    /// Check a `(date, color)` pair against the policy. Non-red colors always
    /// pass.
    pub fn check(&self, date: NaiveDate, color: Color) -> Option<RedViolation> {
        if color != Color::Red {
            return None;
        }
        if self.exclude_out_of_winter && !is_winter(date.month()) {
            return Some(RedViolation::OutOfWinter);
        }
        if self.exclude_saturday && is_saturday(date) {
            return Some(RedViolation::Saturday);
        }
        None
    }
}

/// Counts of tariff records dropped while parsing a history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TariffParseReport {
    pub accepted: usize,
    pub missing_date: usize,
    pub bad_date: usize,
    pub unknown_color: usize,
    pub duplicates: usize,
}

/// Parse raw tariff records into one color per date.
///
/// When several records share a date the most severe color wins. Records
/// without a date, with an unparseable date, or with an unrecognized color
/// are skipped and counted.
pub fn parse_history(records: &[TariffRecord]) -> (BTreeMap<NaiveDate, Color>, TariffParseReport) {
    let mut by_date: BTreeMap<NaiveDate, Color> = BTreeMap::new();
    let mut report = TariffParseReport::default();

    for record in records {
        let Some(raw_date) = record.date.as_deref() else {
            report.missing_date += 1;
            continue;
        };
        let Some(date) = parse_iso_date(raw_date) else {
            report.bad_date += 1;
            continue;
        };
        let Some(color) = record.color.as_deref().and_then(Color::from_label) else {
            report.unknown_color += 1;
            continue;
        };

        report.accepted += 1;
        by_date
            .entry(date)
            .and_modify(|existing| {
                report.duplicates += 1;
                if color > *existing {
                    *existing = color;
                }
            })
            .or_insert(color);
    }

    (by_date, report)
}
