use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::features::FeatureDefaults;
use crate::services::quota::Quotas;
use crate::services::rules::Probabilities;
use crate::services::tariff::RedPolicy;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding every input and output JSON file.
    pub data_dir: PathBuf,
    pub port: u16,
    /// Upper bound for each source HTTP request.
    pub fetch_timeout_secs: u64,
    pub http_user_agent: String,
    pub tempo_api_url: String,
    pub grid_api_url: String,
    pub weather_api_url: String,
    /// Weather location (defaults to Paris).
    pub latitude: f64,
    pub longitude: f64,
    /// First season fetched from the tariff source.
    pub first_season: i32,
    pub policy: PolicyConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let policy = match std::env::var("POLICY_FILE") {
            Ok(path) => PolicyConfig::from_file(Path::new(&path))?,
            Err(_) => PolicyConfig::default(),
        };
        policy.validate()?;

        Ok(Self {
            data_dir: PathBuf::from(env_or("DATA_DIR", "./data")),
            port: env_parse("PORT", 8080)?,
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 15)?,
            http_user_agent: env_or(
                "HTTP_USER_AGENT",
                concat!("tempo-forecast/", env!("CARGO_PKG_VERSION")),
            ),
            tempo_api_url: env_or(
                "TEMPO_API_URL",
                "https://www.api-couleur-tempo.fr/api/jourTempo",
            ),
            grid_api_url: env_or(
                "GRID_API_URL",
                "https://odre.opendatasoft.com/api/records/1.0/search/",
            ),
            weather_api_url: env_or(
                "WEATHER_API_URL",
                "https://archive-api.open-meteo.com/v1/archive",
            ),
            latitude: env_parse("WEATHER_LATITUDE", 48.85)?,
            longitude: env_parse("WEATHER_LONGITUDE", 2.35)?,
            first_season: check_first_season(env_parse("FIRST_SEASON", 2019)?)?,
            policy,
        })
    }
}

/// Start years the tariff source can be asked for.
const FIRST_SEASON_RANGE: std::ops::RangeInclusive<i32> = 2000..=2100;

fn check_first_season(year: i32) -> Result<i32, AppError> {
    if FIRST_SEASON_RANGE.contains(&year) {
        Ok(year)
    } else {
        Err(AppError::Config(format!(
            "FIRST_SEASON must be between {} and {}, got {}",
            FIRST_SEASON_RANGE.start(),
            FIRST_SEASON_RANGE.end(),
            year
        )))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{} must be valid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Business-rule constants shared by every stage.
///
/// Source variants disagreed on several of these; the defaults below are the
/// chosen policy and can be overridden from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub quotas: Quotas,
    pub red_policy: RedPolicy,
    /// Highest probability reported for any color except on Sundays.
    pub confidence_ceiling: f64,
    /// Distribution used when every color has been excluded.
    pub fallback: Probabilities,
    /// Whether the Sunday blue override ignores blue quota exhaustion.
    pub sunday_quota_exempt: bool,
    /// Ascending consumption thresholds (MW) for energy stress levels 1–3.
    pub energy_stress_thresholds: [f64; 3],
    /// Fewest joined rows accepted for training.
    pub min_samples: usize,
    /// Validated predictions kept in the rolling history.
    pub history_window: usize,
    pub defaults: FeatureDefaults,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            quotas: Quotas::default(),
            red_policy: RedPolicy::default(),
            confidence_ceiling: 0.92,
            fallback: Probabilities::new(0.6, 0.3, 0.1),
            sunday_quota_exempt: true,
            energy_stress_thresholds: [45000.0, 52000.0, 60000.0],
            min_samples: 200,
            history_window: 60,
            defaults: FeatureDefaults::default(),
        }
    }
}

impl PolicyConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| AppError::Config(format!("invalid policy file: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read policy file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.quotas.total() > 365 {
            return Err(AppError::Config(format!(
                "quotas add up to {} days, more than a season holds",
                self.quotas.total()
            )));
        }
        if !(0.5..=1.0).contains(&self.confidence_ceiling) {
            return Err(AppError::Config(format!(
                "confidence_ceiling must be within [0.5, 1], got {}",
                self.confidence_ceiling
            )));
        }
        let fallback = [self.fallback.blue, self.fallback.white, self.fallback.red];
        if fallback.iter().any(|p| !p.is_finite() || *p < 0.0) || self.fallback.blue <= 0.0 {
            return Err(AppError::Config(
                "fallback must be non-negative with a positive blue weight".to_string(),
            ));
        }
        let t = &self.energy_stress_thresholds;
        if !(t[0] <= t[1] && t[1] <= t[2]) {
            return Err(AppError::Config(
                "energy_stress_thresholds must be ascending".to_string(),
            ));
        }
        Ok(())
    }
}
