use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ICON_BASE_URL: &str = "http://openweathermap.org/img/w";

/// A geocoding hit. Order within a suggestion list is the server's ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCandidate {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
}

impl CityCandidate {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self { name: name.into(), country: country.into(), state: None }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        self.state = (!state.is_empty()).then_some(state);
        self
    }
}

impl fmt::Display for CityCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => write!(f, "{}, {}, {}", self.name, state, self.country),
            None => write!(f, "{}, {}", self.name, self.country),
        }
    }
}

/// Current conditions for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub condition_main: String,
    pub condition_description: String,
    pub icon_code: String,
}

impl WeatherSnapshot {
    pub fn icon_url(&self) -> String {
        icon_url(&self.icon_code)
    }
}

/// One 3-hour forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub icon_code: String,
    pub condition_description: String,
}

impl ForecastEntry {
    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }

    pub fn icon_url(&self) -> String {
        icon_url(&self.icon_code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub entries: Vec<ForecastEntry>,
}

impl ForecastSeries {
    pub fn new(entries: Vec<ForecastEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForecastEntry> {
        self.entries.iter()
    }
}

/// Current conditions and forecast for the same city, always swapped in together.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub current: WeatherSnapshot,
    pub forecast: ForecastSeries,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Loaded(Arc<WeatherReport>),
    Failed(String),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Everything the front end reads from the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct WeatherState {
    pub fetch: FetchState,
    /// Last successful pair. `Loading` and `Failed` leave it alone.
    pub report: Option<Arc<WeatherReport>>,
    pub last_city: Option<String>,
    pub(crate) sequence: u64,
}

/// Everything the front end reads from the autocomplete engine.
#[derive(Debug, Clone, Default)]
pub struct SuggestionState {
    pub query: String,
    pub suggestions: Vec<CityCandidate>,
    pub no_results: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub(crate) generation: u64,
}

impl SuggestionState {
    pub fn is_open(&self) -> bool {
        !self.suggestions.is_empty() || self.no_results
    }
}

fn icon_url(code: &str) -> String {
    format!("{ICON_BASE_URL}/{code}.png")
}
