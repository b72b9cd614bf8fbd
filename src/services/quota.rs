//! Per-season quota bookkeeping.
//!
//! `QuotaTracker` replays `(date, color)` assignments in chronological order
//! and answers how many days of each color a season still has. A tracker is
//! an owned value built fresh for every run; the predictor clones the
//! confirmed tracker to simulate its own assignments without touching the
//! ground truth.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::services::season::Season;
use crate::services::tariff::{Color, RedPolicy, RedViolation};

/// Maximum number of days per color in one season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Quotas {
    pub blue: u32,
    pub white: u32,
    pub red: u32,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            blue: 300,
            white: 43,
            red: 22,
        }
    }
}

impl Quotas {
    pub fn get(&self, color: Color) -> u32 {
        match color {
            Color::Blue => self.blue,
            Color::White => self.white,
            Color::Red => self.red,
        }
    }

    pub fn total(&self) -> u32 {
        self.blue + self.white + self.red
    }
}

/// Days left per color for one season. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Remaining {
    pub blue: u32,
    pub white: u32,
    pub red: u32,
}

impl Remaining {
    pub fn get(&self, color: Color) -> u32 {
        match color {
            Color::Blue => self.blue,
            Color::White => self.white,
            Color::Red => self.red,
        }
    }

    pub fn is_exhausted(&self, color: Color) -> bool {
        self.get(color) == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("quota replay out of order: {date} recorded after {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },
}

/// Outcome of recording one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Counted,
    /// A red day refused by the red policy; it consumes no quota.
    Rejected(RedViolation),
}

#[derive(Debug, Clone, Default)]
struct SeasonUsage {
    used: [BTreeSet<NaiveDate>; 3],
}

impl SeasonUsage {
    fn count(&self, color: Color) -> usize {
        self.used[color.index()].len()
    }
}

#[derive(Debug, Clone)]
pub struct QuotaTracker {
    quotas: Quotas,
    red_policy: RedPolicy,
    seasons: BTreeMap<Season, SeasonUsage>,
    last_date: Option<NaiveDate>,
}

impl QuotaTracker {
    pub fn new(quotas: Quotas, red_policy: RedPolicy) -> Self {
        Self {
            quotas,
            red_policy,
            seasons: BTreeMap::new(),
            last_date: None,
        }
    }

    /// Build a tracker by replaying an already date-ordered history.
    pub fn replay<'a>(
        quotas: Quotas,
        red_policy: RedPolicy,
        days: impl IntoIterator<Item = (&'a NaiveDate, &'a Color)>,
    ) -> Result<Self, QuotaError> {
        let mut tracker = Self::new(quotas, red_policy);
        for (date, color) in days {
            tracker.record(*date, *color)?;
        }
        Ok(tracker)
    }

    /// Record a day's color into its season.
    ///
    /// Dates must arrive in non-decreasing order; an earlier date is refused
    /// with `QuotaError::OutOfOrder` and leaves the tracker untouched.
    /// Recording the same date twice is idempotent, and re-recording it with
    /// another color moves the day to that color.
    pub fn record(&mut self, date: NaiveDate, color: Color) -> Result<Recorded, QuotaError> {
        if let Some(last) = self.last_date {
            if date < last {
                return Err(QuotaError::OutOfOrder { date, last });
            }
        }
        self.last_date = Some(date);

        let usage = self.seasons.entry(Season::of(date)).or_default();

        if let Some(violation) = self.red_policy.check(date, color) {
            return Ok(Recorded::Rejected(violation));
        }

        for other in Color::ALL {
            if other != color {
                usage.used[other.index()].remove(&date);
            }
        }
        usage.used[color.index()].insert(date);
        Ok(Recorded::Counted)
    }

    /// Number of distinct days already assigned to `color` in `season`.
    pub fn used(&self, season: Season, color: Color) -> usize {
        self.seasons
            .get(&season)
            .map(|usage| usage.count(color))
            .unwrap_or(0)
    }

    pub fn remaining(&self, season: Season, color: Color) -> u32 {
        let used = u32::try_from(self.used(season, color)).unwrap_or(u32::MAX);
        self.quotas.get(color).saturating_sub(used)
    }

    /// Remaining quota for the season containing `date`.
    pub fn remaining_for(&self, date: NaiveDate) -> Remaining {
        let season = Season::of(date);
        Remaining {
            blue: self.remaining(season, Color::Blue),
            white: self.remaining(season, Color::White),
            red: self.remaining(season, Color::Red),
        }
    }

    pub fn quotas(&self) -> Quotas {
        self.quotas
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    /// Seasons seen so far with their used counts (blue, white, red).
    pub fn season_summaries(&self) -> Vec<(Season, [usize; 3])> {
        self.seasons
            .iter()
            .map(|(season, usage)| {
                (
                    *season,
                    [
                        usage.count(Color::Blue),
                        usage.count(Color::White),
                        usage.count(Color::Red),
                    ],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn tracker() -> QuotaTracker {
        QuotaTracker::new(Quotas::default(), RedPolicy::default())
    }

    #[test]
    fn test_fresh_season_has_full_quota() {
        let t = tracker();
        let remaining = t.remaining_for(d("2024-10-01"));
        assert_eq!(
            remaining,
            Remaining {
                blue: 300,
                white: 43,
                red: 22
            }
        );
    }

    #[test]
    fn test_recording_consumes_quota_in_own_season() {
        let mut t = tracker();
        t.record(d("2024-11-04"), Color::White).unwrap();
        t.record(d("2024-11-05"), Color::Red).unwrap();
        t.record(d("2025-09-02"), Color::White).unwrap();

        let season = Season::starting(2024);
        assert_eq!(t.remaining(season, Color::White), 42);
        assert_eq!(t.remaining(season, Color::Red), 21);
        assert_eq!(t.remaining(Season::starting(2025), Color::White), 42);
        assert_eq!(t.remaining(Season::starting(2025), Color::Red), 22);
    }

    #[test]
    fn test_recording_is_idempotent_per_date() {
        let mut t = tracker();
        let day = d("2024-12-02");
        t.record(day, Color::White).unwrap();
        t.record(day, Color::White).unwrap();
        assert_eq!(t.used(Season::of(day), Color::White), 1);
    }

    #[test]
    fn test_rerecording_moves_day_to_new_color() {
        let mut t = tracker();
        let day = d("2024-12-02");
        t.record(day, Color::Blue).unwrap();
        t.record(day, Color::White).unwrap();
        assert_eq!(t.used(Season::of(day), Color::Blue), 0);
        assert_eq!(t.used(Season::of(day), Color::White), 1);
    }

    #[test]
    fn test_disallowed_red_days_are_not_counted() {
        let mut t = tracker();
        assert_eq!(
            t.record(d("2024-10-15"), Color::Red),
            Ok(Recorded::Rejected(RedViolation::OutOfWinter))
        );
        // 2025-01-04 is a Saturday
        assert_eq!(
            t.record(d("2025-01-04"), Color::Red),
            Ok(Recorded::Rejected(RedViolation::Saturday))
        );
        assert_eq!(t.remaining(Season::starting(2024), Color::Red), 22);
    }

    #[test]
    fn test_out_of_order_date_is_refused() {
        let mut t = tracker();
        t.record(d("2024-12-10"), Color::White).unwrap();
        let err = t.record(d("2024-12-09"), Color::White).unwrap_err();
        assert_eq!(
            err,
            QuotaError::OutOfOrder {
                date: d("2024-12-09"),
                last: d("2024-12-10")
            }
        );
        assert_eq!(t.used(Season::starting(2024), Color::White), 1);
        assert_eq!(t.last_date(), Some(d("2024-12-10")));
    }

    #[test]
    fn test_same_date_again_is_not_out_of_order() {
        let mut t = tracker();
        t.record(d("2024-12-10"), Color::White).unwrap();
        assert!(t.record(d("2024-12-10"), Color::White).is_ok());
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let quotas = Quotas {
            blue: 300,
            white: 2,
            red: 1,
        };
        let mut t = QuotaTracker::new(quotas, RedPolicy::default());
        let start = d("2024-12-02");
        for offset in 0..4 {
            t.record(start + Duration::days(offset), Color::White).unwrap();
        }
        assert_eq!(t.used(Season::of(start), Color::White), 4);
        assert_eq!(t.remaining(Season::of(start), Color::White), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut confirmed = tracker();
        confirmed.record(d("2024-12-02"), Color::White).unwrap();
        let mut simulated = confirmed.clone();
        simulated.record(d("2024-12-03"), Color::White).unwrap();

        let season = Season::starting(2024);
        assert_eq!(confirmed.remaining(season, Color::White), 42);
        assert_eq!(simulated.remaining(season, Color::White), 41);
    }

    #[test]
    fn test_replay_builds_summaries() {
        let mut history = BTreeMap::new();
        history.insert(d("2024-12-02"), Color::White);
        history.insert(d("2024-12-03"), Color::Red);
        history.insert(d("2024-12-04"), Color::Blue);
        let t = QuotaTracker::replay(Quotas::default(), RedPolicy::default(), &history).unwrap();
        assert_eq!(t.season_summaries(), vec![(Season::starting(2024), [1, 1, 1])]);
    }

    proptest! {
        #[test]
        fn test_remaining_plus_used_equals_quota(colors in proptest::collection::vec(0usize..3, 0..200)) {
            let mut t = tracker();
            let start = d("2024-11-04");
            for (offset, c) in colors.iter().enumerate() {
                let date = start + Duration::days(offset as i64);
                t.record(date, Color::ALL[*c]).unwrap();
            }
            let season = Season::of(start);
            for color in Color::ALL {
                let used = t.used(season, color) as u32;
                let quota = t.quotas().get(color);
                let remaining = t.remaining(season, color);
                if used <= quota {
                    prop_assert_eq!(remaining + used, quota);
                } else {
                    prop_assert_eq!(remaining, 0);
                }
            }
        }
    }
}
