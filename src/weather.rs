use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest weather values, starting from renderable placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub temp: i64,
    pub feels_like: i64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub forecast: String,
    pub forecast_short: String,
    pub day_forecast: String,
    pub day_low: i64,
    pub day_high: i64,
}

impl Default for WeatherReport {
    fn default() -> Self {
        Self {
            temp: 0,
            feels_like: 0,
            humidity: 0,
            wind_speed: 0.0,
            forecast: "N/A".to_string(),
            forecast_short: "~Error~".to_string(),
            day_forecast: "N/A".to_string(),
            day_low: 0,
            day_high: 0,
        }
    }
}

/// Parses an OpenWeatherMap current-weather document.
pub fn parse_weather_response(content: &str) -> Result<WeatherReport> {
    let raw = serde_json::from_str::<CurrentWeatherFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow!("invalid weather JSON at line {line}, column {column}: {err}")
    })?;

    let mut report = WeatherReport::default();
    if let Some(condition) = raw.weather.into_iter().next() {
        report.forecast = condition.description.clone();
        report.day_forecast = condition.description;
        report.forecast_short = if condition.main.contains("Thunder") {
            "T-Storms".to_string()
        } else {
            condition.main
        };
    }
    report.temp = raw.main.temp.round() as i64;
    report.feels_like = raw.main.feels_like.round() as i64;
    report.humidity = raw.main.humidity.round() as i64;
    report.day_low = raw.main.temp_min.round() as i64;
    report.day_high = raw.main.temp_max.round() as i64;
    report.wind_speed = (raw.wind.speed * 10.0).round() / 10.0;
    Ok(report)
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherFile {
    #[serde(default)]
    weather: Vec<ConditionFile>,
    #[serde(default)]
    main: MainFile,
    #[serde(default)]
    wind: WindFile,
}

#[derive(Debug, Deserialize)]
struct ConditionFile {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize, Default)]
struct MainFile {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
}

#[derive(Debug, Deserialize, Default)]
struct WindFile {
    #[serde(default)]
    speed: f64,
}

/// Shared last-known-good report, read by the tick loop.
#[derive(Debug, Clone, Default)]
pub struct WeatherHandle {
    report: Arc<RwLock<WeatherReport>>,
}

impl WeatherHandle {
    pub fn snapshot(&self) -> WeatherReport {
        match self.report.read() {
            Ok(report) => report.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn publish(&self, report: WeatherReport) {
        match self.report.write() {
            Ok(mut current) => *current = report,
            Err(poisoned) => *poisoned.into_inner() = report,
        }
    }
}

enum PollRequest {
    Poll,
    SetUrl(Option<String>),
}

/// Background fetcher; dropping it stops the worker thread.
pub struct WeatherPoller {
    requests: Option<Sender<PollRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl WeatherPoller {
    pub fn spawn(url: Option<String>, handle: WeatherHandle) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build weather HTTP client")?;
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("weather-poller".to_string())
            .spawn(move || poll_loop(client, url, handle, rx))
            .context("failed to spawn weather poller thread")?;
        Ok(Self {
            requests: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn request_poll(&self) {
        self.send(PollRequest::Poll);
    }

    pub fn set_url(&self, url: Option<String>) {
        self.send(PollRequest::SetUrl(url));
    }

    fn send(&self, request: PollRequest) {
        if let Some(tx) = &self.requests
            && tx.send(request).is_err()
        {
            warn!("weather poller is no longer running");
        }
    }
}

impl Drop for WeatherPoller {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn poll_loop(
    client: reqwest::blocking::Client,
    mut url: Option<String>,
    handle: WeatherHandle,
    requests: Receiver<PollRequest>,
) {
    while let Ok(request) = requests.recv() {
        match request {
            PollRequest::SetUrl(next) => url = next,
            PollRequest::Poll => {
                let Some(target) = url.as_deref() else {
                    debug!("weather poll skipped: no weather_url configured");
                    continue;
                };
                match fetch_weather(&client, target) {
                    Ok(report) => {
                        info!(
                            "weather updated: {} {}F feels {}F",
                            report.forecast_short, report.temp, report.feels_like
                        );
                        handle.publish(report);
                    }
                    Err(err) => warn!("weather poll failed, keeping last report: {err:#}"),
                }
            }
        }
    }
    debug!("weather poller stopped");
}

fn fetch_weather(client: &reqwest::blocking::Client, url: &str) -> Result<WeatherReport> {
    let body = client
        .get(url)
        .send()
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .context("weather endpoint returned an error status")?
        .text()
        .context("failed to read weather response body")?;
    parse_weather_response(&body)
}
