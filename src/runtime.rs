use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use log::{debug, info, warn};

use crate::control::{
    Command, CommandError, CommandResult, ControlInbox, Reply, StatusSnapshot, TimerStatus,
};
use crate::display::{Buzzer, Display, compose_frame};
use crate::face::config::ClockConfig;
use crate::face::scheduler::{ClockScheduler, FaceSlot};
use crate::notify::{Notifier, TIMER_COMPLETE_MESSAGE};
use crate::template::{DataProvider, render};
use crate::time_provider::{TimeProvider, WallClock};
use crate::timer::{Timer, TimerMode, TimerSpec, TimerTick};
use crate::weather::{WeatherHandle, WeatherPoller, WeatherReport};

const WEATHER_POLL_EVERY_MINUTES: i64 = 5;

pub type ConfigLoader = Box<dyn FnMut() -> Result<ClockConfig> + Send>;

/// Cooperative stop signal checked once per loop iteration.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

pub(crate) struct FrameData<'a> {
    pub clock: &'a WallClock,
    pub weather: &'a WeatherReport,
    pub timer: Option<&'a Timer>,
}

impl DataProvider for FrameData<'_> {
    fn wall_clock(&self) -> &WallClock {
        self.clock
    }

    fn weather(&self) -> &WeatherReport {
        self.weather
    }

    fn timer_text(&self) -> String {
        self.timer.map(Timer::format).unwrap_or_default()
    }
}

pub struct ClockRuntime {
    scheduler: ClockScheduler,
    timer: Option<Timer>,
    inbox: ControlInbox,
    loader: ConfigLoader,
    display: Box<dyn Display>,
    buzzer: Box<dyn Buzzer>,
    notifier: Box<dyn Notifier>,
    weather: WeatherHandle,
    poller: Option<WeatherPoller>,
    last_second: Option<i64>,
    last_minute: Option<i64>,
    shown: Option<FaceSlot>,
}

impl ClockRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: ClockScheduler,
        inbox: ControlInbox,
        loader: ConfigLoader,
        display: Box<dyn Display>,
        buzzer: Box<dyn Buzzer>,
        notifier: Box<dyn Notifier>,
        weather: WeatherHandle,
        poller: Option<WeatherPoller>,
    ) -> Self {
        if let Some(poller) = &poller {
            poller.request_poll();
        }
        Self {
            scheduler,
            timer: None,
            inbox,
            loader,
            display,
            buzzer,
            notifier,
            weather,
            poller,
            last_second: None,
            last_minute: None,
            shown: None,
        }
    }

    pub fn run(
        &mut self,
        time: &dyn TimeProvider,
        tick_interval: Duration,
        shutdown: &ShutdownToken,
    ) -> Result<()> {
        info!(
            "clock loop running every {} ms on {}",
            tick_interval.as_millis(),
            time.label()
        );
        let mut next_tick = Instant::now();
        while !shutdown.is_cancelled() {
            let now = time.now().context("failed to read wall clock")?;
            if let Err(err) = self.tick(&now) {
                warn!("tick failed: {err:#}");
            }
            next_tick += tick_interval;
            sleep_until(next_tick);
            if Instant::now() > next_tick + tick_interval {
                next_tick = Instant::now();
            }
        }

        info!("clock loop stopping");
        self.buzzer.set(false);
        self.display.clear()
    }

    pub fn tick<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<()> {
        let clock = WallClock::from_datetime(now);
        for envelope in self.inbox.drain() {
            let result = self.handle(&envelope.command, &clock);
            if let Err(err) = &result {
                warn!("rejected {:?}: {err}", envelope.command);
            }
            envelope.respond(result);
        }

        let second = now.timestamp();
        let new_second = self.last_second != Some(second);
        if !new_second && !self.scheduler.force_update_pending() {
            return Ok(());
        }
        self.last_second = Some(second);

        if self.scheduler.consume_reload_guard() {
            debug!("reload guard active, skipping render");
            if new_second {
                self.tick_timer(&clock);
            }
            self.scheduler
                .resolve(clock.hour24, clock.minute, clock.day_of_week);
            return Ok(());
        }

        let minute = second.div_euclid(60);
        let new_minute = self.last_minute != Some(minute);
        if new_minute {
            let first_minute = self.last_minute.is_none();
            self.last_minute = Some(minute);
            self.scheduler
                .resolve(clock.hour24, clock.minute, clock.day_of_week);
            if !first_minute {
                self.dispatch_notifications(&clock);
                if minute % WEATHER_POLL_EVERY_MINUTES == 0
                    && let Some(poller) = &self.poller
                {
                    poller.request_poll();
                }
            }
        }

        if new_second {
            self.tick_timer(&clock);
        }

        let slot = self.face_to_show();
        let face_changed = self.shown != Some(slot);
        let timer_demands = new_second
            && self
                .timer
                .as_ref()
                .is_some_and(|timer| timer.is_running() || timer.in_hold_period());
        let face = self.scheduler.face(slot);
        let force = self.scheduler.force_update_pending();
        let should_render = (new_second && face.needs_second_granularity())
            || new_minute
            || force
            || timer_demands
            || face_changed;
        if !should_render {
            return Ok(());
        }

        if self.scheduler.is_power_on() {
            let weather = self.weather.snapshot();
            let data = FrameData {
                clock: &clock,
                weather: &weather,
                timer: self.timer.as_ref(),
            };
            let frame = compose_frame(face, &data, self.scheduler.settings().matrix_width);
            debug!("rendering face {}", frame.face);
            self.display.render(&frame)?;
            self.shown = Some(slot);
        } else if force {
            debug!("power off, clearing display");
            self.display.clear()?;
            self.shown = None;
        }
        self.scheduler.clear_force_update();
        Ok(())
    }

    fn dispatch_notifications(&mut self, clock: &WallClock) {
        let weather = self.weather.snapshot();
        let data = FrameData {
            clock,
            weather: &weather,
            timer: self.timer.as_ref(),
        };
        for notification in self.scheduler.notifications() {
            if !notification.is_due(clock.hour24, clock.minute, clock.day_of_week) {
                continue;
            }
            let message = render(&notification.message, &data);
            if let Err(err) = self.notifier.notify(&message) {
                warn!("failed to deliver notification: {err:#}");
            }
        }
    }

    fn tick_timer(&mut self, clock: &WallClock) {
        let hold_max = self.scheduler.settings().timer_hold_seconds;
        let Some(timer) = self.timer.as_mut() else {
            return;
        };
        if timer.is_ended() {
            return;
        }
        match timer.tick(hold_max) {
            TimerTick::Completed => {
                info!("timer complete at {}:{:02}", clock.hour24, clock.minute);
                if self.scheduler.settings().notify_on_timer_end
                    && let Err(err) = self.notifier.notify(TIMER_COMPLETE_MESSAGE)
                {
                    warn!("failed to deliver timer notification: {err:#}");
                }
                self.scheduler.request_force_update();
            }
            TimerTick::Holding(hold) => self.buzzer.set(hold % 2 == 1),
            TimerTick::Ended => {
                info!("timer hold period over");
                self.buzzer.set(false);
                self.scheduler.request_force_update();
            }
            TimerTick::Running(count) => debug!("timer at {count}s"),
            TimerTick::Idle(_) => {}
        }
    }

    /// The timer face wins while a timer is showing; during the hold window
    /// it blinks against the empty face.
    fn face_to_show(&self) -> FaceSlot {
        let current = self.scheduler.current_slot();
        let (Some(timer), Some(timer_face)) = (self.timer.as_ref(), self.scheduler.timer_face())
        else {
            return current;
        };
        if timer.is_ended() {
            return current;
        }
        if timer.in_hold_period()
            && self.scheduler.settings().timer_blink
            && timer.hold_elapsed() % 2 == 0
        {
            return FaceSlot::Empty;
        }
        timer_face
    }

    fn handle(&mut self, command: &Command, clock: &WallClock) -> CommandResult {
        match command {
            Command::SelectFace(name) => {
                let found = self.scheduler.select_by_name(name);
                Ok(Reply::FaceSelected {
                    name: self.scheduler.current_face().display_name(),
                    found,
                })
            }
            Command::ClearOverride => {
                self.scheduler
                    .clear_override(clock.hour24, clock.minute, clock.day_of_week);
                Ok(Reply::Done)
            }
            Command::SetPower(on) => {
                self.scheduler.set_power(*on);
                Ok(Reply::Done)
            }
            Command::Reload => self.reload(),
            Command::CreateTimer(spec) => {
                if *spec == (TimerSpec::Countdown { hour: 0, minute: 0, second: 0 }) {
                    return Err(CommandError::InvalidDuration(
                        "countdown must be longer than zero seconds".to_string(),
                    ));
                }
                self.timer = Some(Timer::from_spec(*spec));
                self.timer_changed();
                Ok(Reply::Done)
            }
            Command::StartTimer => {
                let timer = self.timer.as_mut().ok_or(CommandError::NoTimer)?;
                if timer.is_ended() {
                    return Err(CommandError::TimerEnded);
                }
                timer.start();
                self.scheduler.request_force_update();
                Ok(Reply::Done)
            }
            Command::PauseTimer => {
                let timer = self.timer.as_mut().ok_or(CommandError::NoTimer)?;
                if timer.is_ended() {
                    return Err(CommandError::TimerEnded);
                }
                if !timer.is_started() {
                    return Err(CommandError::TimerNotStarted);
                }
                if timer.in_hold_period() {
                    return Err(CommandError::TimerCompleted);
                }
                timer.pause();
                self.scheduler.request_force_update();
                Ok(Reply::Done)
            }
            Command::CancelTimer => {
                self.timer.take().ok_or(CommandError::NoTimer)?;
                self.timer_changed();
                Ok(Reply::Done)
            }
            Command::ResetTimer => {
                self.timer.as_mut().ok_or(CommandError::NoTimer)?.reset();
                self.timer_changed();
                Ok(Reply::Done)
            }
            Command::ListFaces => Ok(Reply::FaceNames {
                names: self.scheduler.list_face_names(),
            }),
            Command::RefreshWeather => {
                if let Some(poller) = &self.poller {
                    poller.request_poll();
                }
                Ok(Reply::Done)
            }
            Command::Status => Ok(Reply::Status(self.status())),
        }
    }

    fn reload(&mut self) -> CommandResult {
        let loader = &mut self.loader;
        self.scheduler
            .reload_with(|| loader())
            .map_err(|err| CommandError::ReloadFailed(format!("{err:#}")))?;
        self.shown = None;
        if let Some(poller) = &self.poller {
            poller.set_url(self.scheduler.settings().weather_url.clone());
            poller.request_poll();
        }
        Ok(Reply::Done)
    }

    fn timer_changed(&mut self) {
        self.buzzer.set(false);
        self.scheduler.request_force_update();
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            face: self.scheduler.face(self.face_to_show()).display_name(),
            override_active: self.scheduler.is_override_active(),
            power_on: self.scheduler.is_power_on(),
            face_count: self.scheduler.face_count(),
            timer: self.timer.as_ref().map(|timer| TimerStatus {
                mode: match timer.mode() {
                    TimerMode::Countdown => "countdown",
                    TimerMode::Stopwatch => "stopwatch",
                },
                display: timer.format(),
                started: timer.is_started(),
                paused: timer.is_paused(),
                in_hold_period: timer.in_hold_period(),
                ended: timer.is_ended(),
            }),
        }
    }
}

pub fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if now < deadline {
        thread::sleep(deadline - now);
    }
}
