//! Tempo season calendar.
//!
//! A season runs from September 1 to August 31 of the following year. Quotas,
//! day indexes and the implicit-blue fill of the tariff source are all keyed
//! on it.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

/// Months in which red days are allowed and heating demand peaks.
pub const WINTER_MONTHS: [u32; 5] = [11, 12, 1, 2, 3];

/// One Tempo operating year, identified by the year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub struct Season {
    pub start_year: i32,
}

impl Season {
    /// Season containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 9 {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    pub fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    /// September 1 of the start year, clamped to the representable range.
    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, 9, 1).unwrap_or(if self.start_year < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
    }

    /// August 31 of the following year, clamped to the representable range.
    pub fn end(&self) -> NaiveDate {
        self.start_year
            .checked_add(1)
            .and_then(|year| NaiveDate::from_ymd_opt(year, 8, 31))
            .unwrap_or(if self.start_year < 0 {
                NaiveDate::MIN
            } else {
                NaiveDate::MAX
            })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }

    /// 1-based index of `date` within the season.
    pub fn day_index(&self, date: NaiveDate) -> i64 {
        (date - self.start()).num_days() + 1
    }

    /// Every day of the season up to and including `until` (clamped to the
    /// season end).
    pub fn days_until(&self, until: NaiveDate) -> Vec<NaiveDate> {
        let last = until.min(self.end());
        let mut days = Vec::new();
        let mut current = Some(self.start());
        while let Some(day) = current.filter(|d| *d <= last) {
            days.push(day);
            current = day.succ_opt();
        }
        days
    }
}

impl fmt::Display for Season {
    /// Formats as the Tempo API period label, e.g. `2024-2025`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

pub fn is_winter(month: u32) -> bool {
    WINTER_MONTHS.contains(&month)
}

pub fn is_peak_winter(month: u32) -> bool {
    month == 1 || month == 2
}

/// Heating pressure per month, 0 outside winter.
pub fn winter_intensity(month: u32) -> u8 {
    match month {
        11 | 3 => 2,
        12 => 3,
        1 | 2 => 4,
        _ => 0,
    }
}

/// Weekday index with Monday = 0 and Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

pub fn is_saturday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_season_of_autumn_date() {
        let season = Season::of(d("2024-09-01"));
        assert_eq!(season.start_year, 2024);
        assert_eq!(season.start(), d("2024-09-01"));
        assert_eq!(season.end(), d("2025-08-31"));
    }

    #[test]
    fn test_season_of_summer_date_belongs_to_previous_year() {
        let season = Season::of(d("2025-08-31"));
        assert_eq!(season.start_year, 2024);
        assert!(season.contains(d("2025-08-31")));
        assert!(!season.contains(d("2025-09-01")));
    }

    #[test]
    fn test_day_index_is_one_based() {
        let season = Season::of(d("2024-12-25"));
        assert_eq!(season.day_index(d("2024-09-01")), 1);
        assert_eq!(season.day_index(d("2024-09-30")), 30);
        assert_eq!(season.day_index(d("2024-12-25")), 116);
    }

    #[test]
    fn test_display_matches_api_label() {
        assert_eq!(Season::starting(2023).to_string(), "2023-2024");
    }

    #[test]
    fn test_days_until_clamps_to_season_end() {
        let season = Season::starting(2023);
        assert_eq!(season.days_until(d("2023-09-03")).len(), 3);
        // 2024 is a leap year: Sep 1 2023 .. Aug 31 2024 = 366 days
        assert_eq!(season.days_until(d("2030-01-01")).len(), 366);
        assert!(season.days_until(d("2023-08-01")).is_empty());
    }

    #[test]
    fn test_unrepresentable_season_clamps_instead_of_panicking() {
        let far = Season::starting(300_000);
        assert_eq!(far.start(), NaiveDate::MAX);
        assert_eq!(far.end(), NaiveDate::MAX);
        assert!(far.days_until(d("2024-01-01")).is_empty());
        assert_eq!(Season::starting(-300_000).start(), NaiveDate::MIN);
    }

    #[test]
    fn test_winter_helpers() {
        assert!(is_winter(11));
        assert!(is_winter(3));
        assert!(!is_winter(4));
        assert!(!is_winter(10));
        assert!(is_peak_winter(2));
        assert!(!is_peak_winter(12));
        assert_eq!(winter_intensity(1), 4);
        assert_eq!(winter_intensity(12), 3);
        assert_eq!(winter_intensity(11), 2);
        assert_eq!(winter_intensity(7), 0);
    }

    #[test]
    fn test_weekday_helpers() {
        // 2024-12-29 is a Sunday, 2025-01-04 a Saturday
        assert!(is_sunday(d("2024-12-29")));
        assert_eq!(weekday_index(d("2024-12-29")), 6);
        assert!(is_saturday(d("2025-01-04")));
        assert_eq!(weekday_index(d("2024-12-30")), 0);
    }
}
