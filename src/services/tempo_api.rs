//! api-couleur-tempo.fr client.
//!
//! `GET {base}/periode/{YYYY-YYYY}` lists the published days of one season as
//! `[{dateJour, libCouleur}]`. The listing is not always complete: days it
//! leaves out are blue.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::services::season::Season;
use crate::services::sources::{get_json, SourceError};
use crate::services::tariff::Color;
use crate::store::models::TariffRecord;

const SOURCE: &str = "Tempo API";

#[derive(Debug, Clone)]
pub struct TempoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TempoDay {
    date_jour: Option<String>,
    lib_couleur: Option<String>,
}

impl TempoClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Published days of `season`, as raw tariff records.
    pub async fn fetch_season(&self, season: Season) -> Result<Vec<TariffRecord>, SourceError> {
        let url = format!("{}/periode/{}", self.base_url, season);
        let days: Vec<TempoDay> = get_json(&self.client, SOURCE, &url, &[]).await?;
        Ok(days
            .into_iter()
            .map(|day| TariffRecord {
                date: day.date_jour,
                color: day.lib_couleur,
            })
            .collect())
    }
}

/// Mark every unlisted day of `seasons` up to `until` as blue.
///
/// Returns how many days were filled.
pub fn fill_implicit_blue(
    days: &mut BTreeMap<NaiveDate, Color>,
    seasons: &[Season],
    until: NaiveDate,
) -> usize {
    let mut filled = 0;
    for season in seasons {
        for date in season.days_until(until) {
            days.entry(date).or_insert_with(|| {
                filled += 1;
                Color::Blue
            });
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tariff::parse_history;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_season_parses_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/jourTempo/periode/2024-2025"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"dateJour": "2024-11-21", "codeJour": 2, "libCouleur": "Blanc"},
                {"dateJour": "2025-01-07", "codeJour": 3, "libCouleur": "Rouge"},
                {"dateJour": "2025-01-08", "libCouleur": null}
            ])))
            .mount(&server)
            .await;

        let client = TempoClient::new(
            reqwest::Client::new(),
            &format!("{}/api/jourTempo/", server.uri()),
        );
        let records = client.fetch_season(Season::starting(2024)).await.unwrap();
        assert_eq!(records.len(), 3);

        let (days, report) = parse_history(&records);
        assert_eq!(days.get(&d("2025-01-07")), Some(&Color::Red));
        assert_eq!(report.unknown_color, 1);
    }

    #[tokio::test]
    async fn test_fetch_season_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = TempoClient::new(reqwest::Client::new(), &server.uri());
        let err = client.fetch_season(Season::starting(2024)).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { .. }));
    }

    #[test]
    fn test_fill_implicit_blue_up_to_limit() {
        let mut days = BTreeMap::from([(d("2024-09-02"), Color::White)]);
        let filled = fill_implicit_blue(&mut days, &[Season::starting(2024)], d("2024-09-05"));
        assert_eq!(filled, 4);
        assert_eq!(days.len(), 5);
        assert_eq!(days[&d("2024-09-02")], Color::White);
        assert_eq!(days[&d("2024-09-05")], Color::Blue);
        assert!(!days.contains_key(&d("2024-09-06")));
    }

    #[test]
    fn test_fill_implicit_blue_full_past_season() {
        let mut days = BTreeMap::new();
        let filled = fill_implicit_blue(&mut days, &[Season::starting(2023)], d("2025-01-01"));
        // 1 Sep 2023 to 31 Aug 2024, leap year
        assert_eq!(filled, 366);
    }
}
