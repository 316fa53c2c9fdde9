use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use citycast_core::{
    Config, FetchState, FileLastCityStore, LastCityStore, WeatherApp, WeatherError,
    autocomplete::MIN_QUERY_CHARS,
};
use inquire::{Password, Select, Text};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "citycast", version, about = "City weather lookup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure {
        /// Key to store; prompted for when absent.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Search for a city, pick a match, show its weather.
    Search {
        /// Partial city name, at least two characters.
        query: String,
    },

    /// Show weather for a city name as typed.
    Show {
        city: String,
    },

    /// Print the last successfully fetched city.
    Last,

    /// Interactive session: resumes the last city, then keeps searching (default).
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Interactive) {
            Command::Configure { api_key } => configure(api_key),
            Command::Search { query } => {
                let mut app = build_app()?;
                search_and_show(&mut app, &query).await
            }
            Command::Show { city } => show(&build_app()?, &city).await,
            Command::Last => {
                match last_city_store()?.load()? {
                    Some(city) => println!("{city}"),
                    None => println!("No city searched yet."),
                }
                Ok(())
            }
            Command::Interactive => interactive(build_app()?).await,
        }
    }
}

fn configure(api_key: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => Password::new("OpenWeather API key:")
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };

    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn last_city_store() -> anyhow::Result<Arc<FileLastCityStore>> {
    Ok(Arc::new(FileLastCityStore::default_location()?))
}

fn build_app() -> anyhow::Result<WeatherApp> {
    let config = Config::load()?;
    WeatherApp::from_config(&config, last_city_store()?)
}

async fn show(app: &WeatherApp, city: &str) -> anyhow::Result<()> {
    match app.weather().fetch_weather(city).await {
        Err(WeatherError::Validation(msg)) => anyhow::bail!("{msg}"),
        Err(err) => tracing::debug!(error = %err, "fetch failed"),
        Ok(_) => {}
    }

    print_weather(app);
    Ok(())
}

/// Run one lookup for `query` and let the user pick a result.
/// Returns `Ok(())` without fetching when nothing matched.
async fn search_and_show(app: &mut WeatherApp, query: &str) -> anyhow::Result<()> {
    app.set_query(query);
    let state = app.search_mut().settle().await;

    if state.suggestions.is_empty() {
        match app.search().no_results_message() {
            Some(msg) => println!("{msg}"),
            None => println!("Type at least {MIN_QUERY_CHARS} characters to search."),
        }
        return Ok(());
    }

    let candidate = Select::new("Pick a city:", state.suggestions)
        .prompt()
        .context("City selection cancelled")?;

    // Fetch errors are already folded into the published state.
    if let Err(err) = app.select(&candidate).await.context("Weather fetch task failed")? {
        tracing::debug!(error = %err, "fetch failed");
    }

    print_weather(app);
    Ok(())
}

async fn interactive(mut app: WeatherApp) -> anyhow::Result<()> {
    if let Err(err) = app.start().await.context("Resume task failed")? {
        tracing::debug!(error = %err, "resume fetch failed");
    }
    print_weather(&app);

    loop {
        let query = Text::new("Search for a city (empty to quit):")
            .with_initial_value(&app.search().snapshot().query)
            .prompt()
            .context("Failed to read search input")?;

        if query.trim().is_empty() {
            app.search_mut().clear();
            return Ok(());
        }

        if let Err(err) = search_and_show(&mut app, query.trim()).await {
            eprintln!("{err:#}");
        }
    }
}

fn print_weather(app: &WeatherApp) {
    let state = app.weather().snapshot();

    match &state.fetch {
        FetchState::Loaded(report) => println!("{}", render::report(report)),
        FetchState::Failed(reason) => {
            eprintln!("Error: {reason}");
            if let Some(previous) = &state.report {
                println!("Showing previous result:\n{}", render::report(previous));
            }
        }
        FetchState::Idle | FetchState::Loading => {}
    }
}
