use chrono::Local;
use citycast_core::{ForecastSeries, WeatherReport, WeatherSnapshot};

pub fn report(report: &WeatherReport) -> String {
    format!("{}\n{}", weather_card(&report.current), forecast_strip(&report.forecast))
}

pub fn weather_card(weather: &WeatherSnapshot) -> String {
    format!(
        "{name}\n  {temp}  {main}\n  {description}\n  Humidity:   {humidity}%\n  \
         Wind:       {wind} m/s\n  Feels like: {feels}\n  Icon:       {icon}\n",
        name = weather.location_name,
        temp = celsius(weather.temperature_c),
        main = weather.condition_main,
        description = weather.condition_description,
        humidity = weather.humidity_pct,
        wind = weather.wind_speed_mps,
        feels = celsius(weather.feels_like_c),
        icon = weather.icon_url(),
    )
}

pub fn forecast_strip(series: &ForecastSeries) -> String {
    let lines: Vec<String> = series
        .iter()
        .map(|entry| {
            let when = entry.timestamp.with_timezone(&Local).format("%a %d %b %H:%M");
            format!(
                "  {when}  {:>5}  {}",
                celsius(entry.temperature_c),
                entry.condition_description
            )
        })
        .collect();

    format!("5-Day Forecast\n{}\n", lines.join("\n"))
}

fn celsius(value: f64) -> String {
    // Avoid printing "-0°C".
    let rounded = value.round();
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:.0}°C")
}
