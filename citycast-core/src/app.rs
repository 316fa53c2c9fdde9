use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    Config,
    autocomplete::{AutocompleteEngine, AutocompleteOptions},
    error::Result,
    model::CityCandidate,
    orchestrator::{FetchOutcome, WeatherOrchestrator},
    provider::{GeocodingProvider, WeatherProvider, provider_from_config},
    storage::LastCityStore,
};

/// Application state handed to the front end. Built once at launch.
#[derive(Debug)]
pub struct WeatherApp {
    search: AutocompleteEngine,
    weather: WeatherOrchestrator,
}

impl WeatherApp {
    pub fn new(search: AutocompleteEngine, weather: WeatherOrchestrator) -> Self {
        Self { search, weather }
    }

    /// Wire both components to OpenWeather using `config`.
    pub fn from_config(config: &Config, store: Arc<dyn LastCityStore>) -> anyhow::Result<Self> {
        let provider = provider_from_config(config)?;

        let geocoder: Arc<dyn GeocodingProvider> = provider.clone();
        let weather: Arc<dyn WeatherProvider> = provider;

        Ok(Self::new(
            AutocompleteEngine::new(geocoder, AutocompleteOptions::from(&config.search)),
            WeatherOrchestrator::new(weather, store),
        ))
    }

    pub fn search(&self) -> &AutocompleteEngine {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut AutocompleteEngine {
        &mut self.search
    }

    pub fn weather(&self) -> &WeatherOrchestrator {
        &self.weather
    }

    /// Kick off the one-time fetch of the persisted city.
    pub fn start(&self) -> JoinHandle<Result<Option<FetchOutcome>>> {
        let weather = self.weather.clone();
        tokio::spawn(async move { weather.resume().await })
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.search.set_query(query);
    }

    /// Accept a suggestion and start fetching its weather.
    pub fn select(&mut self, candidate: &CityCandidate) -> JoinHandle<Result<FetchOutcome>> {
        let city = self.search.select(candidate);
        self.weather.spawn_fetch(city)
    }

    pub fn select_suggestion(
        &mut self,
        index: usize,
    ) -> Option<JoinHandle<Result<FetchOutcome>>> {
        let candidate = self.search.snapshot().suggestions.get(index).cloned()?;
        Some(self.select(&candidate))
    }
}
