pub mod dataset;
pub mod features;
pub mod fetch;
pub mod grid_api;
pub mod history;
pub mod model;
pub mod predictor;
pub mod quota;
pub mod rules;
pub mod season;
pub mod sources;
pub mod tariff;
pub mod tempo_api;
pub mod weather_api;
