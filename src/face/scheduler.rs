use anyhow::Result;
use log::info;

use crate::face::config::{ClockConfig, ClockSettings};
use crate::face::model::ClockFace;
use crate::notify::ScheduledNotification;

/// Which face is on screen: an index into the owned collection, or the
/// reserved empty face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceSlot {
    Empty,
    Index(usize),
}

pub struct ClockScheduler {
    faces: Vec<ClockFace>,
    empty: ClockFace,
    notifications: Vec<ScheduledNotification>,
    settings: ClockSettings,
    current: FaceSlot,
    override_active: bool,
    force_update: bool,
    power_on: bool,
    reload_guard: u32,
}

impl ClockScheduler {
    pub fn new(config: ClockConfig) -> Self {
        let mut scheduler = Self {
            faces: Vec::new(),
            empty: ClockFace::empty(),
            notifications: Vec::new(),
            settings: ClockSettings::default(),
            current: FaceSlot::Empty,
            override_active: false,
            force_update: true,
            power_on: true,
            reload_guard: 0,
        };
        scheduler.install(config);
        scheduler
    }

    /// Picks the first face, in declaration order, with a matching period.
    /// Does nothing while an override is active. Returns true on a change.
    pub fn resolve(&mut self, hour: u32, minute: u32, day_of_week: u32) -> bool {
        if self.override_active {
            return false;
        }
        let next = self
            .faces
            .iter()
            .position(|face| face.is_active_at(hour, minute, day_of_week))
            .map_or(FaceSlot::Empty, FaceSlot::Index);
        self.switch_to(next)
    }

    /// Case-insensitive lookup that also activates the override. Unknown
    /// names select the empty face and return false.
    pub fn select_by_name(&mut self, name: &str) -> bool {
        let next = self.slot_named(name);
        self.override_active = true;
        self.switch_to(next);
        self.force_update = true;
        next != FaceSlot::Empty
    }

    /// Drops the override and re-resolves against the given time at once.
    pub fn clear_override(&mut self, hour: u32, minute: u32, day_of_week: u32) {
        self.override_active = false;
        self.resolve(hour, minute, day_of_week);
        self.force_update = true;
    }

    /// Loads a new configuration and swaps it in whole.
    ///
    /// A failed load leaves every face, notification and flag as it was.
    /// On success the next tick is skipped for rendering.
    pub fn reload_with<F>(&mut self, load: F) -> Result<()>
    where
        F: FnOnce() -> Result<ClockConfig>,
    {
        let config = load()?;
        self.reload_guard = self.reload_guard.max(1);
        self.install(config);
        self.force_update = true;
        info!("configuration reloaded: {} clock face(s)", self.faces.len());
        Ok(())
    }

    /// Returns true when this tick must not render, counting the guard down.
    pub fn consume_reload_guard(&mut self) -> bool {
        if self.reload_guard == 0 {
            return false;
        }
        self.reload_guard -= 1;
        true
    }

    fn install(&mut self, config: ClockConfig) {
        let overridden = match (self.override_active, self.current) {
            (true, FaceSlot::Index(index)) => self.faces.get(index).map(|f| f.name().to_string()),
            _ => None,
        };

        self.faces = config.faces;
        self.notifications = config.notifications;
        self.settings = config.settings;
        self.current = FaceSlot::Empty;
        self.override_active = false;

        if let Some(name) = overridden {
            let slot = self.slot_named(&name);
            self.current = slot;
            self.override_active = slot != FaceSlot::Empty;
        }
    }

    fn slot_named(&self, name: &str) -> FaceSlot {
        self.faces
            .iter()
            .position(|face| face.matches_name(name))
            .map_or(FaceSlot::Empty, FaceSlot::Index)
    }

    fn switch_to(&mut self, next: FaceSlot) -> bool {
        if next == self.current {
            return false;
        }
        self.current = next;
        info!("clock face changed to {}", self.current_face().name());
        true
    }

    pub fn current_slot(&self) -> FaceSlot {
        self.current
    }

    pub fn current_face(&self) -> &ClockFace {
        self.face(self.current)
    }

    pub fn face(&self, slot: FaceSlot) -> &ClockFace {
        match slot {
            FaceSlot::Index(index) => self.faces.get(index).unwrap_or(&self.empty),
            FaceSlot::Empty => &self.empty,
        }
    }

    pub fn timer_face(&self) -> Option<FaceSlot> {
        let name = self.settings.timer_face.as_deref()?;
        match self.slot_named(name) {
            FaceSlot::Empty => None,
            slot => Some(slot),
        }
    }

    pub fn list_face_names(&self) -> Vec<String> {
        self.faces.iter().map(ClockFace::display_name).collect()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn notifications(&self) -> &[ScheduledNotification] {
        &self.notifications
    }

    pub fn settings(&self) -> &ClockSettings {
        &self.settings
    }

    pub fn is_override_active(&self) -> bool {
        self.override_active
    }

    pub fn set_power(&mut self, on: bool) {
        if self.power_on != on {
            info!("display power {}", if on { "on" } else { "off" });
        }
        self.power_on = on;
        self.force_update = true;
    }

    pub fn is_power_on(&self) -> bool {
        self.power_on
    }

    pub fn request_force_update(&mut self) {
        self.force_update = true;
    }

    pub fn clear_force_update(&mut self) {
        self.force_update = false;
    }

    pub fn force_update_pending(&self) -> bool {
        self.force_update
    }
}
