//! Record types persisted in the data directory.
//!
//! Input records keep loosely typed fields (raw date strings, optional
//! numbers) so that one malformed entry is dropped on its own instead of
//! failing the whole file.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::rules::{Percentages, Rule};
use crate::services::tariff::Color;

/// One day of tariff history as written by the fetch stage or older tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffRecord {
    #[serde(default)]
    pub date: Option<String>,
    /// Source label, e.g. `bleu` or `rouge`.
    #[serde(default, alias = "realColor")]
    pub color: Option<String>,
}

/// Daily weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub date: String,
    /// Mean temperature in °C; `null` when the archive had no value.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Length of the cold spell ending on this day.
    #[serde(default)]
    pub cold_days: Option<u32>,
}

/// Daily grid load summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub date: String,
    /// Mean national consumption (MW).
    #[serde(default, alias = "consommation", alias = "rteConsommation")]
    pub consumption: Option<f64>,
    /// Grid tension level (50–80).
    #[serde(default, alias = "rteTension")]
    pub tension: Option<f64>,
}

/// A day the predictor should produce a color for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDay {
    pub date: String,
    /// Already confirmed by EDF; not predicted.
    #[serde(default)]
    pub fixed: bool,
    /// Confirmed color for fixed days.
    #[serde(default, alias = "couleur")]
    pub color: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub cold_days: Option<u32>,
    #[serde(default, alias = "rteConsommation")]
    pub consumption: Option<f64>,
    #[serde(default)]
    pub tension: Option<f64>,
    /// Days ahead of the publication date.
    #[serde(default)]
    pub horizon: Option<u32>,
}

/// Rule-corrected prediction for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    /// ISO-8601 date (YYYY-MM-DD)
    pub date: String,
    pub predicted_color: Color,
    /// Integer percentages summing to 100
    pub probabilities: Percentages,
    /// Percentage of the predicted color
    pub confidence: u32,
    /// Rule stages that fired, in pipeline order
    pub rules_fired: Vec<Rule>,
    #[serde(default)]
    pub horizon: u32,
}

/// Outcome of a prediction once the real color is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    /// Predicted and real color are both white or red.
    Partial,
    Wrong,
}

/// A validated prediction in the rolling history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: String,
    pub predicted_on: String,
    pub horizon: u32,
    pub predicted_color: Color,
    pub probabilities: Percentages,
    pub real_color: Color,
    pub result: Outcome,
}

/// Accuracy summary over the rolling history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub correct: usize,
    pub partial: usize,
    pub wrong: usize,
    /// Correct predictions, percent
    pub accuracy: u32,
    /// Correct or partial predictions, percent
    pub accuracy_with_partial: u32,
}
