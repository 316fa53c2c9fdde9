//! Debounced city search.
//!
//! Every keystroke goes through [`AutocompleteEngine::set_query`]. Queries of
//! at least [`MIN_QUERY_CHARS`] characters schedule a lookup after the
//! debounce delay; a newer query aborts the pending task through its handle.
//! Each query also bumps a generation counter stored next to the published
//! state, and a result is only applied while its generation is current, so
//! a reply that outruns the abort is still dropped.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::{DEFAULT_DEBOUNCE_MS, DEFAULT_SUGGESTION_LIMIT, SearchConfig},
    error::Result,
    model::{CityCandidate, SuggestionState},
    provider::GeocodingProvider,
};

/// Shorter queries never reach the network.
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteOptions {
    pub debounce: Duration,
    pub limit: usize,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

impl From<&SearchConfig> for AutocompleteOptions {
    fn from(cfg: &SearchConfig) -> Self {
        Self { debounce: cfg.debounce(), limit: cfg.limit }
    }
}

#[derive(Debug)]
pub struct AutocompleteEngine {
    geocoder: Arc<dyn GeocodingProvider>,
    options: AutocompleteOptions,
    state: Arc<watch::Sender<SuggestionState>>,
    pending: Option<JoinHandle<()>>,
}

impl AutocompleteEngine {
    pub fn new(geocoder: Arc<dyn GeocodingProvider>, options: AutocompleteOptions) -> Self {
        let (state, _) = watch::channel(SuggestionState::default());
        Self { geocoder, options, state: Arc::new(state), pending: None }
    }

    pub fn options(&self) -> &AutocompleteOptions {
        &self.options
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Record a new query value. Must be called from within a tokio runtime.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        self.cancel_pending();

        let searchable = query.chars().count() >= MIN_QUERY_CHARS;
        let mut generation = 0;

        self.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.query.clone_from(&query);
            s.loading = false;
            if !searchable {
                s.suggestions.clear();
                s.no_results = false;
                s.last_error = None;
            }
        });

        if !searchable {
            return;
        }

        let task = LookupTask {
            geocoder: Arc::clone(&self.geocoder),
            state: Arc::clone(&self.state),
            query,
            generation,
            debounce: self.options.debounce,
            limit: self.options.limit,
        };

        self.pending = Some(tokio::spawn(task.run()));
    }

    /// Accept a suggestion. Returns the name to hand to the weather fetch.
    pub fn select(&mut self, candidate: &CityCandidate) -> String {
        self.reset_to(candidate.name.clone());
        candidate.name.clone()
    }

    pub fn select_index(&mut self, index: usize) -> Option<CityCandidate> {
        let candidate = self.state.borrow().suggestions.get(index).cloned()?;
        self.select(&candidate);
        Some(candidate)
    }

    pub fn clear(&mut self) {
        self.reset_to(String::new());
    }

    /// Wait for the pending lookup, if any, and return the resulting state.
    pub async fn settle(&mut self) -> SuggestionState {
        if let Some(handle) = self.pending.take() {
            match handle.await {
                Err(err) if err.is_panic() => {
                    tracing::error!(error = %err, "city lookup task panicked");
                }
                _ => {}
            }
        }

        self.snapshot()
    }

    pub fn no_results_message(&self) -> Option<String> {
        let state = self.state.borrow();
        state.no_results.then(|| no_results_message(&state.query))
    }

    fn reset_to(&mut self, query: String) {
        self.cancel_pending();
        self.state.send_modify(|s| {
            s.generation += 1;
            s.query = query;
            s.suggestions.clear();
            s.no_results = false;
            s.loading = false;
            s.last_error = None;
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for AutocompleteEngine {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

pub fn no_results_message(query: &str) -> String {
    format!("No cities found matching \"{query}\"")
}

struct LookupTask {
    geocoder: Arc<dyn GeocodingProvider>,
    state: Arc<watch::Sender<SuggestionState>>,
    query: String,
    generation: u64,
    debounce: Duration,
    limit: usize,
}

impl LookupTask {
    async fn run(self) {
        tokio::time::sleep(self.debounce).await;

        let started = self.state.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            s.loading = true;
            s.no_results = false;
            s.last_error = None;
            true
        });
        if !started {
            return;
        }

        tracing::debug!(query = %self.query, limit = self.limit, "looking up cities");
        let result = self.geocoder.search_cities(&self.query, self.limit).await;

        if let Err(err) = &result {
            tracing::warn!(query = %self.query, error = %err, "city lookup failed");
        }

        if !apply_lookup(&self.state, self.generation, result) {
            tracing::debug!(query = %self.query, "discarding stale city lookup");
        }
    }
}

/// Publish a lookup result if `generation` is still current.
fn apply_lookup(
    state: &watch::Sender<SuggestionState>,
    generation: u64,
    result: Result<Vec<CityCandidate>>,
) -> bool {
    state.send_if_modified(|s| {
        if s.generation != generation {
            return false;
        }

        s.loading = false;
        match result {
            Ok(cities) if !cities.is_empty() => {
                s.suggestions = cities;
                s.no_results = false;
                s.last_error = None;
            }
            Ok(_) => {
                s.suggestions.clear();
                s.no_results = true;
                s.last_error = None;
            }
            Err(err) => {
                s.suggestions.clear();
                s.no_results = true;
                s.last_error = Some(err.to_string());
            }
        }
        true
    })
}
