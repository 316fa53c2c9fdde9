use thiserror::Error;

/// Failures raised by providers and the two core components.
///
/// None of these reach the front end as faults: the autocomplete engine
/// folds them into `no_results`, the orchestrator into `FetchState::Failed`.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Connection, TLS or body read failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("Request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// The upstream answered, but with nothing usable.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Unexpected response shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input rejected before any call was made.
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl WeatherError {
    pub fn parse(context: &str, err: serde_json::Error) -> Self {
        Self::Parse(format!("{context}: {err}"))
    }
}

pub type Result<T, E = WeatherError> = std::result::Result<T, E>;
