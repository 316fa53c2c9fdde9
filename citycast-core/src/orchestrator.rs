//! Weather fetch orchestration.
//!
//! [`WeatherOrchestrator::fetch_weather`] is the only way `FetchState`
//! changes. Both reads run concurrently and the pair is published as a
//! whole or not at all. Every call takes a sequence number when it enters
//! `Loading`; a result whose number is no longer the latest is discarded.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    error::{Result, WeatherError},
    model::{FetchState, WeatherReport, WeatherState},
    provider::WeatherProvider,
    storage::LastCityStore,
};

pub const FETCH_FAILED_MESSAGE: &str = "failed to fetch weather data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result (success or failure) was published.
    Applied,
    /// A newer fetch started meanwhile; this result was dropped.
    Superseded,
}

/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct WeatherOrchestrator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn LastCityStore>,
    state: watch::Sender<WeatherState>,
    /// Held across publish + persist so the store never lags behind `last_city`.
    commit: Mutex<()>,
    resumed: AtomicBool,
}

impl WeatherOrchestrator {
    pub fn new(provider: Arc<dyn WeatherProvider>, store: Arc<dyn LastCityStore>) -> Self {
        let (state, _) = watch::channel(WeatherState::default());
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                state,
                commit: Mutex::new(()),
                resumed: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> WeatherState {
        self.inner.state.borrow().clone()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.inner.state.borrow().fetch.clone()
    }

    pub fn last_city(&self) -> Option<String> {
        self.inner.state.borrow().last_city.clone()
    }

    /// Fetch current conditions and forecast for `city`.
    ///
    /// Blank names are rejected with [`WeatherError::Validation`] and leave
    /// the state untouched. Remote failures are published as
    /// `FetchState::Failed` and also returned so callers can log details.
    pub async fn fetch_weather(&self, city: &str) -> Result<FetchOutcome> {
        let city = validate_city(city)?;
        let sequence = self.begin();

        tracing::debug!(%city, sequence, "fetching weather");

        let provider = &self.inner.provider;
        let fetched = tokio::try_join!(provider.current_weather(&city), provider.forecast(&city));

        match fetched {
            Ok((current, forecast)) => {
                let report = WeatherReport { city: city.clone(), current, forecast };

                if !self.commit(sequence, report) {
                    tracing::debug!(%city, sequence, "discarding superseded weather result");
                    return Ok(FetchOutcome::Superseded);
                }

                tracing::info!(%city, "weather updated");
                Ok(FetchOutcome::Applied)
            }
            Err(err) => {
                tracing::warn!(%city, error = %err, "weather fetch failed");

                let applied = self.publish(sequence, |s| {
                    s.fetch = FetchState::Failed(FETCH_FAILED_MESSAGE.to_string());
                });

                if !applied {
                    tracing::debug!(%city, sequence, "discarding superseded weather failure");
                    return Ok(FetchOutcome::Superseded);
                }

                Err(err)
            }
        }
    }

    /// Fire-and-forget variant of [`fetch_weather`](Self::fetch_weather).
    pub fn spawn_fetch(&self, city: impl Into<String>) -> JoinHandle<Result<FetchOutcome>> {
        let this = self.clone();
        let city = city.into();
        tokio::spawn(async move { this.fetch_weather(&city).await })
    }

    /// Re-fetch the persisted city, if any. Only the first call does anything.
    pub async fn resume(&self) -> Result<Option<FetchOutcome>> {
        if self.inner.resumed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        let city = match self.inner.store.load() {
            Ok(Some(city)) => city,
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::warn!(error = %err, "could not load last city");
                return Ok(None);
            }
        };

        tracing::info!(%city, "resuming last searched city");
        self.inner.state.send_modify(|s| s.last_city = Some(city.clone()));

        self.fetch_weather(&city).await.map(Some)
    }

    fn begin(&self) -> u64 {
        let mut sequence = 0;
        self.inner.state.send_modify(|s| {
            s.sequence += 1;
            sequence = s.sequence;
            s.fetch = FetchState::Loading;
        });
        sequence
    }

    /// Publish a successful report and persist its city as one step.
    fn commit(&self, sequence: u64, report: WeatherReport) -> bool {
        let _commit = self.inner.commit.lock().unwrap_or_else(PoisonError::into_inner);

        let city = report.city.clone();
        let report = Arc::new(report);
        let applied = self.publish(sequence, |s| {
            s.fetch = FetchState::Loaded(Arc::clone(&report));
            s.report = Some(report);
            s.last_city = Some(city.clone());
        });

        if applied {
            self.persist(&city);
        }
        applied
    }

    fn publish(&self, sequence: u64, apply: impl FnOnce(&mut WeatherState)) -> bool {
        self.inner.state.send_if_modified(|s| {
            if s.sequence != sequence {
                return false;
            }
            apply(s);
            true
        })
    }

    fn persist(&self, city: &str) {
        if let Err(err) = self.inner.store.save(city) {
            tracing::warn!(%city, error = %err, "could not persist last city");
        }
    }
}

fn validate_city(city: &str) -> Result<String> {
    let city = city.trim();
    if city.is_empty() {
        return Err(WeatherError::Validation("city name must not be empty".into()));
    }
    Ok(city.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ForecastEntry, ForecastSeries, WeatherSnapshot},
        storage::MemoryLastCityStore,
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::{sync::Mutex, time::Duration};

    #[derive(Debug, Default)]
    struct FakeWeather {
        current_calls: Mutex<Vec<String>>,
        forecast_calls: Mutex<Vec<String>>,
        fail_current: Vec<&'static str>,
        fail_forecast: Vec<&'static str>,
        slow: Vec<&'static str>,
    }

    impl FakeWeather {
        fn current_calls(&self) -> Vec<String> {
            self.current_calls.lock().unwrap().clone()
        }

        fn forecast_calls(&self) -> Vec<String> {
            self.forecast_calls.lock().unwrap().clone()
        }

        async fn delay(&self, city: &str) {
            let latency = if self.slow.iter().any(|c| *c == city) { 2000 } else { 10 };
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeWeather {
        async fn current_weather(&self, city: &str) -> Result<WeatherSnapshot> {
            self.current_calls.lock().unwrap().push(city.to_string());
            self.delay(city).await;

            if self.fail_current.iter().any(|c| *c == city) {
                return Err(WeatherError::Http { status: 404, body: "city not found".into() });
            }
            Ok(snapshot(city))
        }

        async fn forecast(&self, city: &str) -> Result<ForecastSeries> {
            self.forecast_calls.lock().unwrap().push(city.to_string());
            self.delay(city).await;

            if self.fail_forecast.iter().any(|c| *c == city) {
                return Err(WeatherError::EmptyResult("no forecast".into()));
            }
            Ok(ForecastSeries::new(vec![ForecastEntry {
                timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                temperature_c: 7.0,
                icon_code: "01d".into(),
                condition_description: format!("clear over {city}"),
            }]))
        }
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl LastCityStore for BrokenStore {
        fn load(&self) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("disk on fire"))
        }

        fn save(&self, _city: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk on fire"))
        }
    }

    fn snapshot(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location_name: city.to_string(),
            temperature_c: 12.0,
            feels_like_c: 10.5,
            humidity_pct: 70,
            wind_speed_mps: 3.5,
            condition_main: "Clear".into(),
            condition_description: "clear sky".into(),
            icon_code: "01d".into(),
        }
    }

    fn orchestrator(
        provider: &Arc<FakeWeather>,
        store: &Arc<MemoryLastCityStore>,
    ) -> WeatherOrchestrator {
        let provider: Arc<dyn WeatherProvider> = provider.clone();
        let store: Arc<dyn LastCityStore> = store.clone();
        WeatherOrchestrator::new(provider, store)
    }

    fn loaded_city(state: &WeatherState) -> Option<&str> {
        match &state.fetch {
            FetchState::Loaded(report) => Some(report.city.as_str()),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blank_city_is_a_no_op() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        for city in ["", "   ", "\t\n"] {
            let err = weather.fetch_weather(city).await.unwrap_err();
            assert!(matches!(err, WeatherError::Validation(_)));
        }

        let state = weather.snapshot();
        assert_eq!(state.fetch, FetchState::Idle);
        assert_eq!(state.sequence, 0);
        assert!(provider.current_calls().is_empty());
        assert!(provider.forecast_calls().is_empty());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_fetch_loads_and_persists() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        let handle = weather.spawn_fetch("London");
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(weather.fetch_state().is_loading());

        let outcome = handle.await.unwrap().expect("fetch succeeds");
        let state = weather.snapshot();

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(provider.current_calls(), vec!["London"]);
        assert_eq!(provider.forecast_calls(), vec!["London"]);
        assert_eq!(loaded_city(&state), Some("London"));
        let report = state.report.expect("report published");
        assert_eq!(report.current.location_name, "London");
        assert_eq!(report.forecast.len(), 1);
        assert_eq!(state.last_city.as_deref(), Some("London"));
        assert_eq!(store.load().unwrap(), Some("London".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn city_name_is_trimmed() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        weather.fetch_weather("  Oslo ").await.unwrap();

        assert_eq!(provider.current_calls(), vec!["Oslo"]);
        assert_eq!(store.load().unwrap(), Some("Oslo".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_read_fails_the_pair() {
        let provider = Arc::new(FakeWeather {
            fail_current: vec!["Nonexistentville"],
            fail_forecast: vec!["Halfville"],
            ..Default::default()
        });
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        weather.fetch_weather("Tokyo").await.unwrap();
        let before = weather.snapshot().report.expect("Tokyo loaded");

        for city in ["Nonexistentville", "Halfville"] {
            let err = weather.fetch_weather(city).await.unwrap_err();
            assert!(!matches!(err, WeatherError::Validation(_)));

            let state = weather.snapshot();
            assert_eq!(state.fetch, FetchState::Failed(FETCH_FAILED_MESSAGE.to_string()));
            assert_eq!(state.report.as_deref(), Some(before.as_ref()));
            assert_eq!(state.last_city.as_deref(), Some("Tokyo"));
        }

        assert_eq!(store.load().unwrap(), Some("Tokyo".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_cleared_by_next_fetch() {
        let provider =
            Arc::new(FakeWeather { fail_current: vec!["Atlantis"], ..Default::default() });
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        assert!(weather.fetch_weather("Atlantis").await.is_err());
        assert!(weather.fetch_state().error().is_some());

        let handle = weather.spawn_fetch("Rome");
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(weather.fetch_state(), FetchState::Loading);

        handle.await.unwrap().unwrap();
        assert_eq!(loaded_city(&weather.snapshot()), Some("Rome"));
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_does_not_affect_state() {
        let provider: Arc<dyn WeatherProvider> = Arc::new(FakeWeather::default());
        let weather = WeatherOrchestrator::new(provider, Arc::new(BrokenStore));

        let outcome = weather.fetch_weather("Lisbon").await.expect("fetch still succeeds");

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(loaded_city(&weather.snapshot()), Some("Lisbon"));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_fetches_persisted_city_exactly_once() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::with_city("Paris"));
        let weather = orchestrator(&provider, &store);

        let first = weather.resume().await.expect("resume succeeds");
        let second = weather.resume().await.expect("second resume is a no-op");

        assert_eq!(first, Some(FetchOutcome::Applied));
        assert_eq!(second, None);
        assert_eq!(provider.current_calls(), vec!["Paris"]);
        assert_eq!(loaded_city(&weather.snapshot()), Some("Paris"));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_record_does_nothing() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        assert_eq!(weather.resume().await.unwrap(), None);
        assert!(provider.current_calls().is_empty());
        assert_eq!(weather.fetch_state(), FetchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_tolerates_unreadable_store() {
        let provider = Arc::new(FakeWeather::default());
        let dyn_provider: Arc<dyn WeatherProvider> = provider.clone();
        let weather = WeatherOrchestrator::new(dyn_provider, Arc::new(BrokenStore));

        assert_eq!(weather.resume().await.unwrap(), None);
        assert!(provider.current_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_is_discarded() {
        let provider = Arc::new(FakeWeather { slow: vec!["Slowtown"], ..Default::default() });
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        let slow = weather.spawn_fetch("Slowtown");
        tokio::time::sleep(Duration::from_millis(1)).await;

        let fast = weather.fetch_weather("Oslo").await.unwrap();
        let late = slow.await.unwrap().unwrap();

        assert_eq!(fast, FetchOutcome::Applied);
        assert_eq!(late, FetchOutcome::Superseded);
        assert_eq!(loaded_city(&weather.snapshot()), Some("Oslo"));
        assert_eq!(store.load().unwrap(), Some("Oslo".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_failure_does_not_clobber_newer_result() {
        let provider = Arc::new(FakeWeather {
            slow: vec!["Ghost"],
            fail_current: vec!["Ghost"],
            ..Default::default()
        });
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        let ghost = weather.spawn_fetch("Ghost");
        tokio::time::sleep(Duration::from_millis(1)).await;
        weather.fetch_weather("Vienna").await.unwrap();

        assert_eq!(ghost.await.unwrap().unwrap(), FetchOutcome::Superseded);
        assert_eq!(loaded_city(&weather.snapshot()), Some("Vienna"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn store_matches_published_city_after_overlapping_fetches() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        for round in 0..20 {
            let handles: Vec<_> =
                (0..8).map(|i| weather.spawn_fetch(format!("City {round}-{i}"))).collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let state = weather.snapshot();
            assert!(state.last_city.is_some());
            assert_eq!(store.load().unwrap(), state.last_city);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_fetch_yields_same_report() {
        let provider = Arc::new(FakeWeather::default());
        let store = Arc::new(MemoryLastCityStore::new());
        let weather = orchestrator(&provider, &store);

        weather.fetch_weather("Tokyo").await.unwrap();
        let first = weather.snapshot().report.unwrap();
        weather.fetch_weather("Tokyo").await.unwrap();
        let second = weather.snapshot().report.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.current_calls(), vec!["Tokyo", "Tokyo"]);
    }
}
