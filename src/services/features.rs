//! Feature derivation shared by dataset construction and prediction.
//!
//! Every default substituted for a missing input lives in `FeatureDefaults`;
//! every derived column is computed by `derive_features`. The classifier sees
//! the ordered subset listed in `MODEL_FEATURES`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::helpers::{finite_or, round_dp};
use crate::services::quota::{Quotas, Remaining};
use crate::services::season::{
    is_peak_winter, is_winter, weekday_index, winter_intensity, Season,
};
use crate::services::tariff::Color;

/// Values substituted when an input field is absent.
///
/// These silently bias the trained model, so they are part of the policy and
/// kept in one table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    /// Grid consumption (MW) when no grid record exists for the day.
    pub consumption: f64,
    /// Grid tension level when no grid record exists for the day.
    pub tension: f64,
    /// Mean temperature (°C) when the weather value is null or not forecast.
    pub temperature: f64,
    pub cold_days: u32,
    pub horizon: u32,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            consumption: 55000.0,
            tension: 60.0,
            temperature: 10.0,
            cold_days: 0,
            horizon: 0,
        }
    }
}

/// Raw per-day inputs before defaulting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayInputs {
    pub temperature: Option<f64>,
    pub cold_days: Option<u32>,
    pub consumption: Option<f64>,
    pub tension: Option<f64>,
    pub horizon: Option<u32>,
}

/// One row of the training and inference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub date: NaiveDate,
    /// Target label; absent at inference time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    // Calendar
    pub weekday: u32,
    pub month: u32,
    pub day_of_month: u32,
    pub season_day_index: i64,
    pub is_weekend: bool,
    pub is_winter: bool,
    pub is_peak_winter: bool,
    pub winter_intensity: u8,

    // Weather
    pub temperature: f64,
    pub temp_cat: u8,
    pub cold_days: u32,

    // Grid
    pub consumption: i64,
    pub tension: i64,
    pub energy_stress: u8,

    // Quotas
    pub remaining_blue: u32,
    pub remaining_white: u32,
    pub remaining_red: u32,
    pub winter_blue_remaining: u32,
    pub white_usage_ratio: f64,
    pub red_usage_ratio: f64,
    pub quota_pressure: f64,

    pub horizon: u32,
}

/// Named numeric features the classifier can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureName {
    Temperature,
    TempCat,
    ColdDays,
    Consumption,
    Weekday,
    Month,
    DayOfMonth,
    IsWeekend,
    IsWinter,
    WinterIntensity,
    RemainingWhite,
    RemainingRed,
    WinterBlueRemaining,
    SeasonDayIndex,
    QuotaPressure,
    Horizon,
}

/// Feature order used at training time and required at inference time.
pub const MODEL_FEATURES: [FeatureName; 16] = [
    FeatureName::Temperature,
    FeatureName::TempCat,
    FeatureName::ColdDays,
    FeatureName::Consumption,
    FeatureName::Weekday,
    FeatureName::Month,
    FeatureName::DayOfMonth,
    FeatureName::IsWeekend,
    FeatureName::IsWinter,
    FeatureName::WinterIntensity,
    FeatureName::RemainingWhite,
    FeatureName::RemainingRed,
    FeatureName::WinterBlueRemaining,
    FeatureName::SeasonDayIndex,
    FeatureName::QuotaPressure,
    FeatureName::Horizon,
];

impl FeatureRecord {
    pub fn value(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::Temperature => self.temperature,
            FeatureName::TempCat => f64::from(self.temp_cat),
            FeatureName::ColdDays => f64::from(self.cold_days),
            FeatureName::Consumption => self.consumption as f64,
            FeatureName::Weekday => f64::from(self.weekday),
            FeatureName::Month => f64::from(self.month),
            FeatureName::DayOfMonth => f64::from(self.day_of_month),
            FeatureName::IsWeekend => bool_to_f64(self.is_weekend),
            FeatureName::IsWinter => bool_to_f64(self.is_winter),
            FeatureName::WinterIntensity => f64::from(self.winter_intensity),
            FeatureName::RemainingWhite => f64::from(self.remaining_white),
            FeatureName::RemainingRed => f64::from(self.remaining_red),
            FeatureName::WinterBlueRemaining => f64::from(self.winter_blue_remaining),
            FeatureName::SeasonDayIndex => self.season_day_index as f64,
            FeatureName::QuotaPressure => self.quota_pressure,
            FeatureName::Horizon => f64::from(self.horizon),
        }
    }

    /// Values of `names`, in order.
    pub fn vector(&self, names: &[FeatureName]) -> Vec<f64> {
        names.iter().map(|name| self.value(*name)).collect()
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Temperature bin from 0 (below −5 °C) to 5 (15 °C and above).
pub fn temp_category(temp: f64) -> u8 {
    if temp < -5.0 {
        0
    } else if temp < 0.0 {
        1
    } else if temp < 5.0 {
        2
    } else if temp < 10.0 {
        3
    } else if temp < 15.0 {
        4
    } else {
        5
    }
}

/// Grid stress level 0–3 given ascending consumption thresholds.
pub fn energy_stress(consumption: f64, thresholds: &[f64; 3]) -> u8 {
    if consumption >= thresholds[2] {
        3
    } else if consumption >= thresholds[1] {
        2
    } else if consumption >= thresholds[0] {
        1
    } else {
        0
    }
}

/// Share of a quota already consumed.
fn usage_ratio(quota: u32, remaining: u32) -> f64 {
    if quota == 0 {
        return 1.0;
    }
    f64::from(quota.saturating_sub(remaining)) / f64::from(quota)
}

/// Weighted white/red consumption, clipped to [0, 1].
pub fn quota_pressure(quotas: &Quotas, remaining: &Remaining) -> f64 {
    let white = usage_ratio(quotas.white, remaining.white);
    let red = usage_ratio(quotas.red, remaining.red);
    (white * 0.5 + red * 0.5).clamp(0.0, 1.0)
}

/// Build the feature row for `date`.
pub fn derive_features(
    date: NaiveDate,
    color: Option<Color>,
    inputs: &DayInputs,
    remaining: Remaining,
    policy: &PolicyConfig,
) -> FeatureRecord {
    let defaults = &policy.defaults;
    let month = date.month();
    let weekday = weekday_index(date);
    let winter = is_winter(month);

    let temperature = finite_or(inputs.temperature, defaults.temperature);
    let consumption = finite_or(inputs.consumption, defaults.consumption);
    let tension = finite_or(inputs.tension, defaults.tension);

    FeatureRecord {
        date,
        color,
        weekday,
        month,
        day_of_month: date.day(),
        season_day_index: Season::of(date).day_index(date),
        is_weekend: weekday >= 5,
        is_winter: winter,
        is_peak_winter: is_peak_winter(month),
        winter_intensity: winter_intensity(month),
        temperature,
        temp_cat: temp_category(temperature),
        cold_days: inputs.cold_days.unwrap_or(defaults.cold_days),
        consumption: consumption.round() as i64,
        tension: tension.round() as i64,
        energy_stress: energy_stress(consumption, &policy.energy_stress_thresholds),
        remaining_blue: remaining.blue,
        remaining_white: remaining.white,
        remaining_red: remaining.red,
        winter_blue_remaining: if winter { remaining.blue } else { 0 },
        white_usage_ratio: round_dp(usage_ratio(policy.quotas.white, remaining.white), 3),
        red_usage_ratio: round_dp(usage_ratio(policy.quotas.red, remaining.red), 3),
        quota_pressure: round_dp(quota_pressure(&policy.quotas, &remaining), 3),
        horizon: inputs.horizon.unwrap_or(defaults.horizon),
    }
}
