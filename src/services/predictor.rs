//! Rule-corrected prediction over upcoming days.
//!
//! Two quota trackers are kept apart: the confirmed one (history plus days
//! already published by EDF) drives quota exhaustion in the rule pipeline,
//! while a simulated clone is credited with each predicted color and feeds the
//! quota features of later days.

use chrono::NaiveDate;

use crate::config::PolicyConfig;
use crate::helpers::parse_iso_date;
use crate::services::features::{derive_features, DayInputs};
use crate::services::model::{Classifier, ModelError};
use crate::services::quota::QuotaTracker;
use crate::services::rules::{DayContext, Probabilities, RulePipeline};
use crate::services::tariff::Color;
use crate::store::models::{PredictionRecord, UpcomingDay};

pub struct Predictor<'a> {
    classifier: &'a dyn Classifier,
    policy: &'a PolicyConfig,
    pipeline: RulePipeline,
    confirmed: QuotaTracker,
    simulated: QuotaTracker,
}

impl<'a> Predictor<'a> {
    pub fn new(classifier: &'a dyn Classifier, policy: &'a PolicyConfig, confirmed: QuotaTracker) -> Self {
        let simulated = confirmed.clone();
        Self {
            classifier,
            policy,
            pipeline: RulePipeline::from_policy(policy),
            confirmed,
            simulated,
        }
    }

    /// Predict one day and credit the result to the simulated tracker.
    pub fn predict_day(&mut self, date: NaiveDate, inputs: &DayInputs) -> Result<PredictionRecord, ModelError> {
        let features = derive_features(
            date,
            None,
            inputs,
            self.simulated.remaining_for(date),
            self.policy,
        );
        let x = features.vector(self.classifier.features());
        let proba = self.classifier.predict_proba(&x)?;
        let raw = Probabilities::from_labelled(
            self.classifier
                .classes()
                .iter()
                .map(String::as_str)
                .zip(proba.iter().copied()),
        );

        let day = DayContext {
            date,
            remaining: self.confirmed.remaining_for(date),
        };
        let correction = self.pipeline.apply(raw, &day);
        let color = correction.predicted_color();
        let percentages = correction.probabilities().to_percentages();
        let confidence = percentages.get(color);

        tracing::info!(
            "{}: {} at {}% (blue {} / white {} / red {}), rules fired: {:?}",
            date,
            color,
            confidence,
            percentages.blue,
            percentages.white,
            percentages.red,
            correction.fired()
        );

        if let Err(e) = self.simulated.record(date, color) {
            tracing::warn!("Simulated quota not credited for {}: {}", date, e);
        }

        Ok(PredictionRecord {
            date: date.to_string(),
            predicted_color: color,
            probabilities: percentages,
            confidence,
            rules_fired: correction.into_fired(),
            horizon: features.horizon,
        })
    }

    /// Predict every non-fixed upcoming day in date order.
    ///
    /// Fixed days are recorded as confirmed colors and produce no prediction.
    /// Days with an unparseable date are skipped.
    pub fn predict_all(&mut self, upcoming: &[UpcomingDay]) -> Result<Vec<PredictionRecord>, ModelError> {
        let mut days: Vec<(NaiveDate, &UpcomingDay)> = Vec::with_capacity(upcoming.len());
        for day in upcoming {
            match parse_iso_date(&day.date) {
                Some(date) => days.push((date, day)),
                None => tracing::warn!("Skipping upcoming day with bad date '{}'", day.date),
            }
        }
        days.sort_by_key(|(date, _)| *date);

        let mut predictions = Vec::new();
        for (date, day) in days {
            if day.fixed {
                self.record_fixed(date, day);
                continue;
            }
            let inputs = DayInputs {
                temperature: day.temperature,
                cold_days: day.cold_days,
                consumption: day.consumption,
                tension: day.tension,
                horizon: day.horizon,
            };
            predictions.push(self.predict_day(date, &inputs)?);
        }
        Ok(predictions)
    }

    fn record_fixed(&mut self, date: NaiveDate, day: &UpcomingDay) {
        let Some(color) = day.color.as_deref().and_then(Color::from_label) else {
            tracing::warn!("Fixed day {} has no recognizable color", date);
            return;
        };
        for tracker in [&mut self.confirmed, &mut self.simulated] {
            if let Err(e) = tracker.record(date, color) {
                tracing::warn!("Fixed day {} not recorded: {}", date, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::services::features::FeatureName;
    use crate::services::quota::Quotas;
    use crate::services::rules::Rule;

    /// Returns fixed probabilities and remembers every vector it was given.
    struct FixedClassifier {
        classes: Vec<String>,
        features: Vec<FeatureName>,
        proba: Vec<f64>,
        seen: RefCell<Vec<Vec<f64>>>,
    }

    impl FixedClassifier {
        fn new(classes: &[&str], proba: &[f64]) -> Self {
            Self {
                classes: classes.iter().map(|c| c.to_string()).collect(),
                features: vec![FeatureName::RemainingRed],
                proba: proba.to_vec(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn features(&self) -> &[FeatureName] {
            &self.features
        }

        fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
            self.seen.borrow_mut().push(x.to_vec());
            Ok(self.proba.clone())
        }
    }

    fn policy_with_red(red: u32) -> PolicyConfig {
        PolicyConfig {
            quotas: Quotas {
                red,
                ..Quotas::default()
            },
            ..PolicyConfig::default()
        }
    }

    fn tracker(policy: &PolicyConfig) -> QuotaTracker {
        QuotaTracker::new(policy.quotas, policy.red_policy)
    }

    fn upcoming(date: &str) -> UpcomingDay {
        UpcomingDay {
            date: date.to_string(),
            ..UpcomingDay::default()
        }
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_simulated_quota_feeds_features_not_rules() {
        let policy = policy_with_red(1);
        let classifier = FixedClassifier::new(&["blue", "white", "red"], &[0.05, 0.05, 0.9]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        // Tuesday and Wednesday in January
        let out = predictor
            .predict_all(&[upcoming("2025-01-08"), upcoming("2025-01-07")])
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, "2025-01-07");
        assert_eq!(out[0].predicted_color, Color::Red);
        // Confirmed red quota is untouched, so the second day can still be red.
        assert_eq!(out[1].predicted_color, Color::Red);
        assert_eq!(*classifier.seen.borrow(), vec![vec![1.0], vec![0.0]]);
    }

    #[test]
    fn test_fixed_day_consumes_confirmed_quota() {
        let policy = policy_with_red(1);
        let classifier = FixedClassifier::new(&["blue", "white", "red"], &[0.05, 0.15, 0.8]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        let fixed = UpcomingDay {
            date: "2025-01-07".to_string(),
            fixed: true,
            color: Some("ROUGE".to_string()),
            ..UpcomingDay::default()
        };
        let out = predictor.predict_all(&[fixed, upcoming("2025-01-08")]).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, "2025-01-08");
        assert_eq!(out[0].predicted_color, Color::White);
        assert_eq!(out[0].probabilities.red, 0);
        assert!(out[0].rules_fired.contains(&Rule::RedQuotaExhausted));
    }

    #[test]
    fn test_sunday_prediction_is_blue() {
        let policy = PolicyConfig::default();
        let classifier = FixedClassifier::new(&["blue", "white", "red"], &[0.3, 0.3, 0.4]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        let record = predictor.predict_day(d("2024-12-29"), &DayInputs::default()).unwrap();
        assert_eq!(record.predicted_color, Color::Blue);
        assert_eq!(record.confidence, 100);
        assert_eq!(record.rules_fired, vec![Rule::SundayOverride]);
    }

    #[test]
    fn test_unknown_labels_are_ignored() {
        let policy = PolicyConfig::default();
        let classifier = FixedClassifier::new(&["violet", "bleu", "blanc"], &[0.9, 0.06, 0.04]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        let record = predictor.predict_day(d("2025-01-07"), &DayInputs::default()).unwrap();
        assert_eq!(record.predicted_color, Color::Blue);
        assert_eq!(record.probabilities.blue, 60);
        assert_eq!(record.probabilities.sum(), 100);
    }

    #[test]
    fn test_bad_dates_are_skipped() {
        let policy = PolicyConfig::default();
        let classifier = FixedClassifier::new(&["blue", "white", "red"], &[0.6, 0.3, 0.1]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        let out = predictor
            .predict_all(&[upcoming("tomorrow"), upcoming("2025-01-07")])
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_horizon_is_carried() {
        let policy = PolicyConfig::default();
        let classifier = FixedClassifier::new(&["blue", "white", "red"], &[0.6, 0.3, 0.1]);
        let mut predictor = Predictor::new(&classifier, &policy, tracker(&policy));

        let day = UpcomingDay {
            horizon: Some(3),
            ..upcoming("2025-01-09")
        };
        let out = predictor.predict_all(&[day]).unwrap();
        assert_eq!(out[0].horizon, 3);
    }
}
