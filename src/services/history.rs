//! Rolling log of validated predictions.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::helpers::parse_iso_date;
use crate::services::tariff::Color;
use crate::store::models::{HistoryEntry, HistoryStats, Outcome, PredictionRecord};

/// Compare a prediction with the real color. White and red count as a partial
/// hit for each other.
pub fn classify(predicted: Color, real: Color) -> Outcome {
    if predicted == real {
        Outcome::Correct
    } else if predicted != Color::Blue && real != Color::Blue {
        Outcome::Partial
    } else {
        Outcome::Wrong
    }
}

/// Merge newly verifiable predictions into `existing`.
///
/// A prediction is added when its date is on or before `today`, its real
/// color is known and the date is not in the log yet. The result holds at
/// most `window` entries, newest first. Returns the log and the number of
/// entries added.
pub fn merge(
    existing: Vec<HistoryEntry>,
    predictions: &[PredictionRecord],
    real_colors: &BTreeMap<NaiveDate, Color>,
    today: NaiveDate,
    window: usize,
) -> (Vec<HistoryEntry>, usize) {
    let mut entries = existing;
    let mut known: HashSet<String> = entries.iter().map(|e| e.date.clone()).collect();
    let mut added = 0;

    for prediction in predictions {
        let Some(date) = parse_iso_date(&prediction.date) else {
            continue;
        };
        if date > today || known.contains(&prediction.date) {
            continue;
        }
        let Some(real) = real_colors.get(&date) else {
            continue;
        };

        let result = classify(prediction.predicted_color, *real);
        tracing::info!(
            "{}: predicted {} real {} -> {:?}",
            prediction.date,
            prediction.predicted_color,
            real,
            result
        );
        entries.push(HistoryEntry {
            date: prediction.date.clone(),
            predicted_on: today.to_string(),
            horizon: prediction.horizon,
            predicted_color: prediction.predicted_color,
            probabilities: prediction.probabilities,
            real_color: *real,
            result,
        });
        known.insert(prediction.date.clone());
        added += 1;
    }

    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(window);
    (entries, added)
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

pub fn stats(entries: &[HistoryEntry]) -> HistoryStats {
    let count = |outcome: Outcome| entries.iter().filter(|e| e.result == outcome).count();
    let total = entries.len();
    let correct = count(Outcome::Correct);
    let partial = count(Outcome::Partial);
    HistoryStats {
        total,
        correct,
        partial,
        wrong: count(Outcome::Wrong),
        accuracy: percent(correct, total),
        accuracy_with_partial: percent(correct + partial, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rules::Percentages;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn prediction(date: &str, color: Color) -> PredictionRecord {
        PredictionRecord {
            date: date.to_string(),
            predicted_color: color,
            probabilities: Percentages {
                blue: 50,
                white: 30,
                red: 20,
            },
            confidence: 50,
            rules_fired: Vec::new(),
            horizon: 1,
        }
    }

    fn entry(date: &str, result: Outcome) -> HistoryEntry {
        HistoryEntry {
            date: date.to_string(),
            predicted_on: date.to_string(),
            horizon: 1,
            predicted_color: Color::Blue,
            probabilities: Percentages {
                blue: 100,
                white: 0,
                red: 0,
            },
            real_color: Color::Blue,
            result,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Color::Blue, Color::Blue), Outcome::Correct);
        assert_eq!(classify(Color::White, Color::Red), Outcome::Partial);
        assert_eq!(classify(Color::Red, Color::White), Outcome::Partial);
        assert_eq!(classify(Color::Blue, Color::White), Outcome::Wrong);
        assert_eq!(classify(Color::Red, Color::Blue), Outcome::Wrong);
    }

    #[test]
    fn test_merge_adds_only_verifiable_days() {
        let real = BTreeMap::from([
            (d("2025-01-06"), Color::White),
            (d("2025-01-07"), Color::Red),
            (d("2025-01-09"), Color::Blue),
        ]);
        let predictions = vec![
            prediction("2025-01-06", Color::Red),
            prediction("2025-01-07", Color::Red),
            prediction("2025-01-08", Color::Blue), // no real color yet
            prediction("2025-01-09", Color::Blue), // in the future
        ];
        let (log, added) = merge(Vec::new(), &predictions, &real, d("2025-01-08"), 60);

        assert_eq!(added, 2);
        assert_eq!(log[0].date, "2025-01-07");
        assert_eq!(log[0].result, Outcome::Correct);
        assert_eq!(log[1].result, Outcome::Partial);
        assert_eq!(log[1].predicted_on, "2025-01-08");
    }

    #[test]
    fn test_merge_keeps_existing_validation() {
        let real = BTreeMap::from([(d("2025-01-06"), Color::Blue)]);
        let existing = vec![entry("2025-01-06", Outcome::Wrong)];
        let (log, added) = merge(
            existing,
            &[prediction("2025-01-06", Color::Blue)],
            &real,
            d("2025-01-08"),
            60,
        );
        assert_eq!(added, 0);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].result, Outcome::Wrong);
    }

    #[test]
    fn test_merge_truncates_to_window_newest_first() {
        let existing: Vec<HistoryEntry> = (1..=9)
            .map(|day| entry(&format!("2025-01-0{}", day), Outcome::Correct))
            .collect();
        let (log, _) = merge(existing, &[], &BTreeMap::new(), d("2025-01-10"), 5);
        assert_eq!(log.len(), 5);
        assert_eq!(log[0].date, "2025-01-09");
        assert_eq!(log[4].date, "2025-01-05");
    }

    #[test]
    fn test_stats() {
        let entries = vec![
            entry("2025-01-01", Outcome::Correct),
            entry("2025-01-02", Outcome::Correct),
            entry("2025-01-03", Outcome::Partial),
            entry("2025-01-04", Outcome::Wrong),
            entry("2025-01-05", Outcome::Wrong),
            entry("2025-01-06", Outcome::Correct),
        ];
        let s = stats(&entries);
        assert_eq!(s.total, 6);
        assert_eq!(s.correct, 3);
        assert_eq!(s.partial, 1);
        assert_eq!(s.wrong, 2);
        assert_eq!(s.accuracy, 50);
        assert_eq!(s.accuracy_with_partial, 67);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(stats(&[]), HistoryStats::default());
    }
}
