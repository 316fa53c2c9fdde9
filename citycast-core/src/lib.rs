//! Core library for the `citycast` weather client.
//!
//! This crate defines:
//! - Debounced city autocomplete against a geocoding provider
//! - Weather fetch orchestration (current conditions + forecast, all or nothing)
//! - Persistence of the last searched city
//! - Configuration & the OpenWeather provider
//!
//! It is used by `citycast-cli`, but any front end can drive [`WeatherApp`].

pub mod app;
pub mod autocomplete;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod storage;

pub use app::WeatherApp;
pub use autocomplete::{AutocompleteEngine, AutocompleteOptions};
pub use config::{Config, SearchConfig};
pub use error::WeatherError;
pub use model::{
    CityCandidate, FetchState, ForecastEntry, ForecastSeries, SuggestionState, WeatherReport,
    WeatherSnapshot, WeatherState,
};
pub use orchestrator::{FetchOutcome, WeatherOrchestrator};
pub use provider::{GeocodingProvider, WeatherProvider};
pub use storage::{FileLastCityStore, LastCityStore, MemoryLastCityStore};
