mod api;
mod control;
mod diagnostics;
mod display;
mod face;
mod layout;
mod notify;
mod runtime;
mod template;
mod time_provider;
mod timer;
mod weather;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use env_logger::Env;
use log::info;

use crate::api::{ApiServer, ApiServerConfig};
use crate::control::control_channel;
use crate::display::{ConsoleDisplay, NullBuzzer};
use crate::face::config::{ClockConfig, load_clock_config};
use crate::face::scheduler::ClockScheduler;
use crate::notify::LogNotifier;
use crate::runtime::{ClockRuntime, ConfigLoader, ShutdownToken};
use crate::time_provider::{SystemTimeProvider, TimeProvider};
use crate::weather::{WeatherHandle, WeatherPoller};

#[derive(Parser, Debug)]
#[command(
    name = "matrixclock",
    version,
    about = "Scheduled clock faces for an LED matrix display"
)]
struct Cli {
    #[arg(long, default_value = "matrix_config.json")]
    config: PathBuf,

    /// Overrides clock_data.weather_url from the config file.
    #[arg(long)]
    weather_url: Option<String>,

    #[arg(long, default_value = "0.0.0.0")]
    api_bind: String,

    #[arg(long, default_value_t = 8099)]
    api_port: u16,

    #[arg(long, default_value_t = false)]
    mdns_enabled: bool,

    #[arg(long, default_value = "matrixclock")]
    mdns_instance: String,

    #[arg(long, default_value_t = 200)]
    tick_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Load the config, print what would be shown now, and exit.
    #[arg(long, visible_alias = "diagnostics")]
    check: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str()))
        .format_timestamp_secs()
        .init();
    if cli.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }

    let config = load_config(&cli.config, cli.weather_url.as_deref())?;
    if config.faces.is_empty() {
        bail!(
            "{} defines no clock faces; at least one is required",
            cli.config.display()
        );
    }

    let time = SystemTimeProvider;
    if cli.check {
        let now = time.now()?;
        println!("{}", diagnostics::check_report(&cli.config, config, &now));
        return Ok(());
    }

    info!(
        "{} v{} loaded {} clock face(s) from {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.faces.len(),
        cli.config.display()
    );

    let shutdown = ShutdownToken::default();
    let (control, inbox) = control_channel();
    let weather = WeatherHandle::default();
    let poller = WeatherPoller::spawn(config.settings.weather_url.clone(), weather.clone())?;
    let buzzer = NullBuzzer::new(config.settings.buzzer_pin);

    let loader: ConfigLoader = {
        let path = cli.config.clone();
        let weather_url = cli.weather_url.clone();
        Box::new(move || load_config(&path, weather_url.as_deref()))
    };

    let api_server = ApiServer::start(
        ApiServerConfig {
            bind_addr: cli.api_bind.clone(),
            port: cli.api_port,
            mdns_enabled: cli.mdns_enabled,
            mdns_instance: cli.mdns_instance,
        },
        control,
        shutdown.clone(),
    )
    .with_context(|| {
        format!(
            "failed to start control API at {}:{}",
            cli.api_bind, cli.api_port
        )
    })?;

    let mut runtime = ClockRuntime::new(
        ClockScheduler::new(config),
        inbox,
        loader,
        Box::new(ConsoleDisplay::stdout()),
        Box::new(buzzer),
        Box::new(LogNotifier),
        weather,
        Some(poller),
    );
    let result = runtime.run(&time, Duration::from_millis(cli.tick_ms), &shutdown);

    drop(api_server);
    result
}

fn load_config(path: &Path, weather_url: Option<&str>) -> Result<ClockConfig> {
    let mut config = load_clock_config(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if let Some(url) = weather_url {
        config.settings.weather_url = Some(url.to_string());
    }
    Ok(config)
}
