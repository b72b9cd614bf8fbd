//! Open-Meteo archive client.
//!
//! Daily mean temperatures for one location over a date range.
//! See: https://open-meteo.com/en/docs/historical-weather-api

use chrono::NaiveDate;
use serde::Deserialize;

use crate::helpers::parse_iso_date;
use crate::services::sources::{get_json, SourceError};
use crate::store::models::WeatherRecord;

const SOURCE: &str = "Open-Meteo";

/// Mean temperature below which a day counts toward a cold spell (°C).
const COLD_THRESHOLD_C: f64 = 0.0;

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: Option<ArchiveDaily>,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
}

impl WeatherClient {
    pub fn new(client: reqwest::Client, base_url: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            latitude,
            longitude,
        }
    }

    /// Daily records from `start` to `end` inclusive, with cold spell
    /// lengths filled in.
    pub async fn fetch_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeatherRecord>, SourceError> {
        let query = [
            ("latitude", format!("{:.2}", self.latitude)),
            ("longitude", format!("{:.2}", self.longitude)),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("daily", "temperature_2m_mean".to_string()),
            ("timezone", "Europe/Paris".to_string()),
        ];
        let response: ArchiveResponse = get_json(&self.client, SOURCE, &self.base_url, &query).await?;
        let Some(daily) = response.daily else {
            return Err(SourceError::Decode {
                source_name: SOURCE,
                message: "missing 'daily' block".to_string(),
            });
        };

        let mut records: Vec<WeatherRecord> = daily
            .time
            .into_iter()
            .zip(daily.temperature_2m_mean)
            .filter(|(date, _)| parse_iso_date(date).is_some())
            .map(|(date, temperature)| WeatherRecord {
                date,
                temperature,
                cold_days: None,
            })
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date));
        fill_cold_days(&mut records);
        Ok(records)
    }
}

/// Set `cold_days` to the length of the run of consecutive sub-zero days
/// ending on each record. A missing temperature or a gap in the dates ends
/// the run.
pub fn fill_cold_days(records: &mut [WeatherRecord]) {
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for record in records.iter_mut() {
        let date = parse_iso_date(&record.date);
        let contiguous = matches!((previous, date), (Some(p), Some(d)) if (d - p).num_days() == 1);
        if !contiguous {
            run = 0;
        }
        run = match record.temperature {
            Some(t) if t < COLD_THRESHOLD_C => run + 1,
            _ => 0,
        };
        record.cold_days = Some(run);
        previous = date;
    }
}
