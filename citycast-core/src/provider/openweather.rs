use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::{Result, WeatherError},
    model::{CityCandidate, ForecastEntry, ForecastSeries, WeatherSnapshot},
};

use super::{GeocodingProvider, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const GEOCODING_PATH: &str = "/geo/1.0/direct";
const CURRENT_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";
const UNITS: &str = "metric";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str, query: &[(&str, &str)], what: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!(%url, what, "OpenWeather request");

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl GeocodingProvider for OpenWeatherProvider {
    async fn search_cities(&self, query: &str, limit: usize) -> Result<Vec<CityCandidate>> {
        let limit = limit.to_string();
        let body = self
            .get(GEOCODING_PATH, &[("q", query), ("limit", limit.as_str())], "geocoding")
            .await?;

        parse_geocoding(&body)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, city: &str) -> Result<WeatherSnapshot> {
        let body = self
            .get(CURRENT_PATH, &[("q", city), ("units", UNITS)], "current weather")
            .await?;

        parse_current(&body)
    }

    async fn forecast(&self, city: &str) -> Result<ForecastSeries> {
        let body = self
            .get(FORECAST_PATH, &[("q", city), ("units", UNITS)], "5-day forecast")
            .await?;

        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    country: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwForecastWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

/// Decode a `/geo/1.0/direct` body, keeping the server's order.
pub fn parse_geocoding(body: &str) -> Result<Vec<CityCandidate>> {
    let parsed: Vec<OwGeoEntry> =
        serde_json::from_str(body).map_err(|e| WeatherError::parse("geocoding JSON", e))?;

    Ok(parsed
        .into_iter()
        .map(|entry| {
            let city = CityCandidate::new(entry.name, entry.country);
            match entry.state {
                Some(state) => city.with_state(state),
                None => city,
            }
        })
        .collect())
}

/// Decode a `/data/2.5/weather` body.
pub fn parse_current(body: &str) -> Result<WeatherSnapshot> {
    let parsed: OwCurrentResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::parse("current weather JSON", e))?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Parse("current weather has no condition entry".into()))?;

    Ok(WeatherSnapshot {
        location_name: parsed.name,
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        condition_main: condition.main,
        condition_description: condition.description,
        icon_code: condition.icon,
    })
}

/// Decode a `/data/2.5/forecast` body. An empty `list` is an error.
pub fn parse_forecast(body: &str) -> Result<ForecastSeries> {
    let parsed: OwForecastResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::parse("forecast JSON", e))?;

    if parsed.list.is_empty() {
        return Err(WeatherError::EmptyResult("forecast response contained no data".into()));
    }

    let entries = parsed
        .list
        .into_iter()
        .map(|entry| -> Result<ForecastEntry> {
            let timestamp = unix_to_utc(entry.dt).ok_or_else(|| {
                WeatherError::Parse(format!("forecast timestamp {} out of range", entry.dt))
            })?;
            let condition = entry.weather.into_iter().next().ok_or_else(|| {
                WeatherError::Parse(format!("forecast entry {} has no condition", entry.dt))
            })?;

            Ok(ForecastEntry {
                timestamp,
                temperature_c: entry.main.temp,
                icon_code: condition.icon,
                condition_description: condition.description,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ForecastSeries::new(entries))
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
