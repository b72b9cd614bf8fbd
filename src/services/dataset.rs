//! Joins tariff, weather and grid histories into the training table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::PolicyConfig;
use crate::helpers::parse_iso_date;
use crate::services::features::{derive_features, DayInputs, FeatureRecord};
use crate::services::quota::{QuotaError, QuotaTracker, Recorded};
use crate::services::tariff::{parse_history, Color, TariffParseReport};
use crate::store::models::{GridRecord, TariffRecord, WeatherRecord};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("tariff history is empty or has no usable record")]
    NoTariffHistory,

    #[error("tariff history has no blue day; the history is incomplete")]
    NoBlueDays,

    #[error("only {found} usable days, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error(transparent)]
    Quota(#[from] QuotaError),
}

/// Days dropped while building the table, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub tariff: TariffParseReport,
    /// Red days refused by the red policy.
    pub red_policy: usize,
    pub no_weather: usize,
    pub bad_weather_date: usize,
    pub bad_grid_date: usize,
    /// Days joined without a grid record (kept, with defaults).
    pub grid_defaulted: usize,
}

#[derive(Debug, Clone)]
pub struct DatasetBuild {
    /// Rows sorted by date.
    pub records: Vec<FeatureRecord>,
    pub drops: DropCounts,
}

fn index_weather<'a>(
    records: &'a [WeatherRecord],
    bad: &mut usize,
) -> BTreeMap<NaiveDate, &'a WeatherRecord> {
    let mut by_date = BTreeMap::new();
    for record in records {
        match parse_iso_date(&record.date) {
            Some(date) => {
                by_date.entry(date).or_insert(record);
            }
            None => *bad += 1,
        }
    }
    by_date
}

fn index_grid<'a>(records: &'a [GridRecord], bad: &mut usize) -> BTreeMap<NaiveDate, &'a GridRecord> {
    let mut by_date = BTreeMap::new();
    for record in records {
        match parse_iso_date(&record.date) {
            Some(date) => {
                by_date.entry(date).or_insert(record);
            }
            None => *bad += 1,
        }
    }
    by_date
}

/// Build one feature row per eligible tariff day.
///
/// Every accepted tariff day is replayed into the quota tracker in date
/// order, and its own color is counted before the remaining quotas are read.
/// A day without weather still consumes quota but produces no row.
pub fn build_dataset(
    tariff: &[TariffRecord],
    weather: &[WeatherRecord],
    grid: &[GridRecord],
    policy: &PolicyConfig,
) -> Result<DatasetBuild, DatasetError> {
    let (days, tariff_report) = parse_history(tariff);
    if days.is_empty() {
        return Err(DatasetError::NoTariffHistory);
    }
    if !days.values().any(|color| *color == Color::Blue) {
        return Err(DatasetError::NoBlueDays);
    }

    let mut drops = DropCounts {
        tariff: tariff_report,
        ..DropCounts::default()
    };
    let weather_by_date = index_weather(weather, &mut drops.bad_weather_date);
    let grid_by_date = index_grid(grid, &mut drops.bad_grid_date);

    let mut tracker = QuotaTracker::new(policy.quotas, policy.red_policy);
    let mut records = Vec::with_capacity(days.len());

    for (date, color) in &days {
        if let Recorded::Rejected(violation) = tracker.record(*date, *color)? {
            tracing::debug!("red day {} refused: {:?}", date, violation);
            drops.red_policy += 1;
            continue;
        }
        let remaining = tracker.remaining_for(*date);

        let Some(weather) = weather_by_date.get(date) else {
            drops.no_weather += 1;
            continue;
        };
        let grid = grid_by_date.get(date);
        if grid.is_none() {
            drops.grid_defaulted += 1;
        }

        let inputs = DayInputs {
            temperature: weather.temperature,
            cold_days: weather.cold_days,
            consumption: grid.and_then(|g| g.consumption),
            tension: grid.and_then(|g| g.tension),
            horizon: None,
        };
        records.push(derive_features(*date, Some(*color), &inputs, remaining, policy));
    }

    log_drops(&drops, records.len());

    if records.len() < policy.min_samples {
        return Err(DatasetError::InsufficientData {
            found: records.len(),
            required: policy.min_samples,
        });
    }

    Ok(DatasetBuild { records, drops })
}

fn log_drops(drops: &DropCounts, kept: usize) {
    let t = &drops.tariff;
    if t.missing_date + t.bad_date + t.unknown_color > 0 {
        tracing::warn!(
            "Skipped tariff records: {} without date, {} with bad date, {} with unknown color",
            t.missing_date,
            t.bad_date,
            t.unknown_color
        );
    }
    if t.duplicates > 0 {
        tracing::info!("Merged {} duplicate tariff dates (most severe color kept)", t.duplicates);
    }
    if drops.bad_weather_date + drops.bad_grid_date > 0 {
        tracing::warn!(
            "Skipped {} weather and {} grid records with bad dates",
            drops.bad_weather_date,
            drops.bad_grid_date
        );
    }
    tracing::info!(
        "Dataset: {} rows kept, {} red days refused by policy, {} days without weather, {} days with default grid values",
        kept,
        drops.red_policy,
        drops.no_weather,
        drops.grid_defaulted
    );
}
