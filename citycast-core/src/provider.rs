use crate::{
    Config,
    error::Result,
    model::{CityCandidate, ForecastSeries, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Resolves free text into ranked city candidates.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + Debug {
    /// An empty `Vec` means "no match", not an error.
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<CityCandidate>>;
}

/// Reads current conditions and the 5-day / 3-hour forecast, both metric.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, city: &str) -> Result<WeatherSnapshot>;

    async fn forecast(&self, city: &str) -> Result<ForecastSeries>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<OpenWeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No OpenWeather API key configured.\n\
                 Hint: run `citycast configure` or set {}.",
            crate::config::API_KEY_ENV
        )
    })?;

    Ok(Arc::new(OpenWeatherProvider::with_base_url(api_key.to_owned(), config.base_url())))
}
