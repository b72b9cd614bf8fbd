pub mod files;
pub mod models;

use std::path::PathBuf;

/// Locations of every file the stages read or write.
#[derive(Debug, Clone)]
pub struct DataFiles {
    dir: PathBuf,
}

impl DataFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tariff_history(&self) -> PathBuf {
        self.dir.join("tariff_history.json")
    }

    pub fn weather_history(&self) -> PathBuf {
        self.dir.join("weather_history.json")
    }

    pub fn grid_history(&self) -> PathBuf {
        self.dir.join("grid_history.json")
    }

    pub fn dataset(&self) -> PathBuf {
        self.dir.join("dataset.json")
    }

    pub fn model(&self) -> PathBuf {
        self.dir.join("model.json")
    }

    pub fn upcoming(&self) -> PathBuf {
        self.dir.join("upcoming.json")
    }

    pub fn predictions(&self) -> PathBuf {
        self.dir.join("predictions.json")
    }

    pub fn prediction_history(&self) -> PathBuf {
        self.dir.join("prediction_history.json")
    }

    pub fn stats(&self) -> PathBuf {
        self.dir.join("stats.json")
    }
}
