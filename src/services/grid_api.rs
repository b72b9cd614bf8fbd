//! ODRE eco2mix client.
//!
//! The national consumption dataset holds one record per quarter hour; it is
//! reduced to a daily mean and a coarse tension level.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::helpers::parse_iso_date;
use crate::services::sources::{get_json, SourceError};
use crate::store::models::GridRecord;

const SOURCE: &str = "ODRE eco2mix";
const DATASET: &str = "eco2mix-national-cons-def";
const MAX_ROWS: u32 = 10000;

#[derive(Debug, Clone)]
pub struct GridClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    records: Vec<SearchRecord>,
}

#[derive(Debug, Deserialize)]
struct SearchRecord {
    #[serde(default)]
    fields: Eco2mixFields,
}

#[derive(Debug, Default, Deserialize)]
struct Eco2mixFields {
    date_heure: Option<String>,
    consommation: Option<f64>,
}

impl GridClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub async fn fetch_daily(&self) -> Result<Vec<GridRecord>, SourceError> {
        let query = [
            ("dataset", DATASET.to_string()),
            ("rows", MAX_ROWS.to_string()),
            ("sort", "date_heure".to_string()),
        ];
        let response: SearchResponse = get_json(&self.client, SOURCE, &self.base_url, &query).await?;
        let samples = response.records.into_iter().filter_map(|r| {
            let date = parse_iso_date(r.fields.date_heure.as_deref()?)?;
            let consumption = r.fields.consommation.filter(|c| c.is_finite())?;
            Some((date, consumption))
        });
        Ok(daily_summary(samples))
    }
}

/// Tension level for a daily mean consumption (MW).
pub fn tension_level(consumption: f64) -> f64 {
    if consumption < 45000.0 {
        50.0
    } else if consumption < 55000.0 {
        60.0
    } else if consumption < 65000.0 {
        70.0
    } else {
        80.0
    }
}

/// Average samples per day, sorted by date. The mean is truncated to whole
/// megawatts.
pub fn daily_summary(samples: impl IntoIterator<Item = (NaiveDate, f64)>) -> Vec<GridRecord> {
    let mut by_day: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for (date, consumption) in samples {
        let entry = by_day.entry(date).or_insert((0.0, 0));
        entry.0 += consumption;
        entry.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (sum, n))| {
            let mean = (sum / f64::from(n)).trunc();
            GridRecord {
                date: date.to_string(),
                consumption: Some(mean),
                tension: Some(tension_level(mean)),
            }
        })
        .collect()
}
