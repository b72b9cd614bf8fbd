//! Fetch stage: refresh the three source histories.
//!
//! The sources are queried concurrently. A source that fails (or returns
//! nothing) leaves its last persisted file in place; the stage itself only
//! fails when a file cannot be written.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::grid_api::GridClient;
use crate::services::season::Season;
use crate::services::sources::{http_client, SourceError};
use crate::services::tariff::parse_history;
use crate::services::tempo_api::{fill_implicit_blue, TempoClient};
use crate::services::weather_api::WeatherClient;
use crate::store::files::{write_atomic, StoreError};
use crate::store::models::TariffRecord;
use crate::store::DataFiles;

/// Days written per source; `None` when the last persisted file was kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub tariff_days: Option<usize>,
    pub weather_days: Option<usize>,
    pub grid_days: Option<usize>,
}

/// Fetch every season in `seasons`, fill implicit blue days up to
/// `until` and return one record per day.
async fn fetch_tariff(
    client: &TempoClient,
    seasons: &[Season],
    until: NaiveDate,
) -> Result<Vec<TariffRecord>, SourceError> {
    let results = join_all(seasons.iter().map(|season| client.fetch_season(*season))).await;

    let mut listed = Vec::new();
    for (season, result) in seasons.iter().zip(results) {
        let records = result?;
        tracing::info!("Tempo season {}: {} days listed", season, records.len());
        listed.extend(records);
    }

    let (mut days, report) = parse_history(&listed);
    if report.unknown_color + report.bad_date + report.missing_date > 0 {
        tracing::warn!(
            "Tempo listing: {} unknown colors, {} bad dates, {} missing dates skipped",
            report.unknown_color,
            report.bad_date,
            report.missing_date
        );
    }
    let filled = fill_implicit_blue(&mut days, seasons, until);
    tracing::info!("Tempo history: {} days, {} implicit blue", days.len(), filled);

    Ok(days
        .into_iter()
        .map(|(date, color)| TariffRecord {
            date: Some(date.to_string()),
            color: Some(color.as_str().to_string()),
        })
        .collect())
}

fn persist<T: Serialize>(
    name: &str,
    path: &Path,
    result: Result<Vec<T>, SourceError>,
) -> Result<Option<usize>, StoreError> {
    match result {
        Ok(records) if records.is_empty() => {
            tracing::warn!("{} returned no data, keeping {}", name, path.display());
            Ok(None)
        }
        Ok(records) => {
            write_atomic(path, &records)?;
            tracing::info!("{}: wrote {} days to {}", name, records.len(), path.display());
            Ok(Some(records.len()))
        }
        Err(e) => {
            tracing::warn!("{} fetch failed, keeping last persisted file: {}", name, e);
            Ok(None)
        }
    }
}

/// Refresh tariff, weather and grid histories up to the day before `today`.
pub async fn fetch_all(config: &AppConfig, files: &DataFiles, today: NaiveDate) -> Result<FetchSummary, AppError> {
    let client = http_client(
        &config.http_user_agent,
        Duration::from_secs(config.fetch_timeout_secs),
    )?;
    let until = today.pred_opt().unwrap_or(today);

    let seasons: Vec<Season> = (config.first_season..=Season::of(until).start_year)
        .map(Season::starting)
        .collect();
    let weather_start = Season::starting(config.first_season).start();

    let tempo = TempoClient::new(client.clone(), &config.tempo_api_url);
    let weather = WeatherClient::new(
        client.clone(),
        &config.weather_api_url,
        config.latitude,
        config.longitude,
    );
    let grid = GridClient::new(client, &config.grid_api_url);

    let (tariff_result, weather_result, grid_result) = tokio::join!(
        fetch_tariff(&tempo, &seasons, until),
        async {
            if weather_start > until {
                return Ok(Vec::new());
            }
            weather.fetch_range(weather_start, until).await
        },
        grid.fetch_daily(),
    );

    Ok(FetchSummary {
        tariff_days: persist("Tempo API", &files.tariff_history(), tariff_result)?,
        weather_days: persist("Open-Meteo", &files.weather_history(), weather_result)?,
        grid_days: persist("ODRE eco2mix", &files.grid_history(), grid_result)?,
    })
}
