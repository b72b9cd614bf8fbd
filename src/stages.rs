//! Offline stages, one per CLI subcommand.
//!
//! Each stage reads its inputs from the data directory, runs one service and
//! writes its outputs atomically. Errors abort the stage; per-record problems
//! are logged and skipped by the services.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::{AppConfig, PolicyConfig};
use crate::errors::AppError;
use crate::services::dataset::build_dataset;
use crate::services::features::FeatureRecord;
use crate::services::fetch::{fetch_all, FetchSummary};
use crate::services::history;
use crate::services::model::{train, ModelBundle};
use crate::services::predictor::Predictor;
use crate::services::quota::QuotaTracker;
use crate::services::tariff::{parse_history, Color};
use crate::store::files::{load_optional, load_required, load_source, write_atomic};
use crate::store::models::{
    GridRecord, HistoryEntry, HistoryStats, PredictionRecord, TariffRecord, UpcomingDay,
    WeatherRecord,
};
use crate::store::DataFiles;

pub async fn run_fetch(config: &AppConfig, today: NaiveDate) -> Result<FetchSummary, AppError> {
    let files = DataFiles::new(&config.data_dir);
    fetch_all(config, &files, today).await
}

/// Tariff history by date. The file must exist.
pub fn load_tariff_days(files: &DataFiles) -> Result<BTreeMap<NaiveDate, Color>, AppError> {
    let records: Vec<TariffRecord> = load_required(&files.tariff_history())?;
    let (days, report) = parse_history(&records);
    if report.accepted < records.len() {
        tracing::warn!(
            "Tariff history: {} of {} records unusable",
            records.len() - report.accepted,
            records.len()
        );
    }
    Ok(days)
}

/// Quota tracker replayed from the confirmed tariff history.
pub fn confirmed_tracker(files: &DataFiles, policy: &PolicyConfig) -> Result<QuotaTracker, AppError> {
    let days = load_tariff_days(files)?;
    let tracker = QuotaTracker::replay(policy.quotas, policy.red_policy, &days)?;
    for (season, [blue, white, red]) in tracker.season_summaries() {
        tracing::debug!(
            "Season {}: {} blue, {} white, {} red confirmed",
            season,
            blue,
            white,
            red
        );
    }
    Ok(tracker)
}

pub fn run_build_dataset(files: &DataFiles, policy: &PolicyConfig) -> Result<usize, AppError> {
    let tariff: Vec<TariffRecord> = load_required(&files.tariff_history())?;
    let weather: Vec<WeatherRecord> = load_source(&files.weather_history());
    let grid: Vec<GridRecord> = load_source(&files.grid_history());

    let build = build_dataset(&tariff, &weather, &grid, policy)?;
    write_atomic(&files.dataset(), &build.records)?;
    tracing::info!(
        "Dataset written: {} rows to {}",
        build.records.len(),
        files.dataset().display()
    );
    Ok(build.records.len())
}

pub fn run_train(files: &DataFiles, policy: &PolicyConfig) -> Result<ModelBundle, AppError> {
    let records: Vec<FeatureRecord> = load_required(&files.dataset())?;
    let bundle = train(&records, policy)?;
    write_atomic(&files.model(), &bundle)?;
    tracing::info!("Model written to {}", files.model().display());
    Ok(bundle)
}

pub fn run_predict(files: &DataFiles, policy: &PolicyConfig) -> Result<Vec<PredictionRecord>, AppError> {
    let bundle: ModelBundle = load_required(&files.model())?;
    bundle.check()?;
    let confirmed = confirmed_tracker(files, policy)?;
    let upcoming: Vec<UpcomingDay> = load_source(&files.upcoming());

    let mut predictor = Predictor::new(&bundle, policy, confirmed);
    let predictions = predictor.predict_all(&upcoming)?;
    write_atomic(&files.predictions(), &predictions)?;
    tracing::info!(
        "Predictions written: {} days to {}",
        predictions.len(),
        files.predictions().display()
    );
    Ok(predictions)
}

pub fn run_update_history(
    files: &DataFiles,
    policy: &PolicyConfig,
    today: NaiveDate,
) -> Result<HistoryStats, AppError> {
    let predictions: Vec<PredictionRecord> = load_source(&files.predictions());
    let existing: Vec<HistoryEntry> = load_optional(&files.prediction_history())?.unwrap_or_default();
    let real_colors = match load_tariff_days(files) {
        Ok(days) => days,
        Err(AppError::Store(e)) => {
            tracing::warn!("No confirmed colors available: {}", e);
            BTreeMap::new()
        }
        Err(e) => return Err(e),
    };

    let (entries, added) = history::merge(
        existing,
        &predictions,
        &real_colors,
        today,
        policy.history_window,
    );
    let stats = history::stats(&entries);

    write_atomic(&files.prediction_history(), &entries)?;
    write_atomic(&files.stats(), &stats)?;
    tracing::info!(
        "History updated: {} new entries, {} total, accuracy {}% ({}% with partial)",
        added,
        entries.len(),
        stats.accuracy,
        stats.accuracy_with_partial
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::tests::synthetic_history;
    use crate::services::rules::Rule;
    use crate::store::files::StoreError;

    #[test]
    fn test_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        let policy = PolicyConfig::default();

        // 730 confirmed days up to 2024-08-30, then three upcoming days.
        let (tariff, weather, grid) = synthetic_history("2022-09-01".parse().unwrap(), 733);
        write_atomic(&files.tariff_history(), &tariff[..730]).unwrap();
        write_atomic(&files.weather_history(), &weather).unwrap();
        write_atomic(&files.grid_history(), &grid).unwrap();

        let rows = run_build_dataset(&files, &policy).unwrap();
        assert_eq!(rows, 730);

        let bundle = run_train(&files, &policy).unwrap();
        assert_eq!(bundle.training_samples, 730);
        assert!(files.model().exists());

        let upcoming = vec![
            UpcomingDay {
                date: "2024-08-31".to_string(),
                temperature: Some(20.0),
                horizon: Some(1),
                ..UpcomingDay::default()
            },
            UpcomingDay {
                date: "2024-09-01".to_string(),
                horizon: Some(2),
                ..UpcomingDay::default()
            },
            UpcomingDay {
                date: "2024-09-02".to_string(),
                temperature: Some(-8.0),
                horizon: Some(3),
                ..UpcomingDay::default()
            },
        ];
        write_atomic(&files.upcoming(), &upcoming).unwrap();

        let predictions = run_predict(&files, &policy).unwrap();
        assert_eq!(predictions.len(), 3);
        for p in &predictions {
            assert_eq!(p.probabilities.sum(), 100);
            // No red outside winter.
            assert_eq!(p.probabilities.red, 0);
        }
        assert_eq!(predictions[1].predicted_color, Color::Blue);
        assert_eq!(predictions[1].confidence, 100);
        assert!(predictions[1].rules_fired.contains(&Rule::SundayOverride));

        // The days become confirmed; validate the predictions.
        write_atomic(&files.tariff_history(), &tariff).unwrap();
        let stats = run_update_history(&files, &policy, "2024-09-02".parse().unwrap()).unwrap();
        assert_eq!(stats.total, 3);
        assert!(stats.correct >= 1);

        let log: Vec<HistoryEntry> = load_required(&files.prediction_history()).unwrap();
        assert_eq!(log[0].date, "2024-09-02");
        assert_eq!(log[0].predicted_on, "2024-09-02");

        // Running again adds nothing.
        let again = run_update_history(&files, &policy, "2024-09-02".parse().unwrap()).unwrap();
        assert_eq!(again, stats);
    }

    #[test]
    fn test_missing_tariff_history_aborts_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        let err = run_build_dataset(&files, &PolicyConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Missing(_))));
    }

    #[test]
    fn test_missing_model_aborts_predict() {
        let dir = tempfile::tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        let err = run_predict(&files, &PolicyConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Missing(_))));
    }

    #[test]
    fn test_update_history_without_inputs_writes_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let files = DataFiles::new(dir.path());
        let stats =
            run_update_history(&files, &PolicyConfig::default(), "2025-01-10".parse().unwrap()).unwrap();
        assert_eq!(stats, HistoryStats::default());
        assert!(files.stats().exists());
    }
}
