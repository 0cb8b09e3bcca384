use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// System-wide operating mode.
///
/// The EMEA API encodes these as numeric codes, the legacy API as string
/// tokens. Both encodings are carried here so the protocol adapter stays a
/// pure lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMode {
    Normal,
    HeatingOff,
    Eco,
    Away,
    DayOff,
    Custom,
}

impl SystemMode {
    /// Numeric mode code used by the EMEA API.
    pub fn as_code(&self) -> u8 {
        match self {
            SystemMode::Normal => 0,
            SystemMode::HeatingOff => 1,
            SystemMode::Eco => 2,
            SystemMode::Away => 3,
            SystemMode::DayOff => 4,
            SystemMode::Custom => 6,
        }
    }

    /// String token used by the legacy API.
    pub fn as_token(&self) -> &'static str {
        match self {
            SystemMode::Normal => "Auto",
            SystemMode::HeatingOff => "HeatingOff",
            SystemMode::Eco => "AutoWithEco",
            SystemMode::Away => "Away",
            SystemMode::DayOff => "DayOff",
            SystemMode::Custom => "Custom",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SystemMode::Normal),
            1 => Some(SystemMode::HeatingOff),
            2 => Some(SystemMode::Eco),
            3 => Some(SystemMode::Away),
            4 => Some(SystemMode::DayOff),
            6 => Some(SystemMode::Custom),
            _ => None,
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "Auto" => Some(SystemMode::Normal),
            "HeatingOff" => Some(SystemMode::HeatingOff),
            "AutoWithEco" => Some(SystemMode::Eco),
            "Away" => Some(SystemMode::Away),
            "DayOff" => Some(SystemMode::DayOff),
            "Custom" => Some(SystemMode::Custom),
            _ => None,
        }
    }
}

/// Desired state for a domestic hot-water device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotWaterState {
    On,
    Off,
    /// Follow the device's own schedule.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    #[default]
    HeatingZone,
    HotWater,
}

impl DeviceKind {
    pub fn as_model_type(&self) -> &'static str {
        match self {
            DeviceKind::HeatingZone => "EMEA_ZONE",
            DeviceKind::HotWater => "DOMESTIC_HOT_WATER",
        }
    }

    pub fn from_model_type(s: &str) -> Self {
        match s {
            "DOMESTIC_HOT_WATER" => DeviceKind::HotWater,
            _ => DeviceKind::HeatingZone,
        }
    }
}

/// A controllable unit: a heating zone or a hot-water device.
#[derive(Debug, Clone, Default)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub temperature: Option<f64>,
    pub setpoint: Option<f64>,
    pub allowed_modes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Target for system-mode commands. Equal to `id` on the legacy API;
    /// the control-system id on the EMEA API.
    pub system_id: String,
    /// Reported by the service but not applied by the override detector.
    pub timezone_offset_minutes: i32,
    pub devices: Vec<Device>,
    pub weather: Option<WeatherSnapshot>,
}

/// Snapshot of the discovered topology. Rebuilt wholesale on refresh;
/// never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct DeviceTree {
    pub locations: Vec<Location>,
}

impl DeviceTree {
    /// First device with the given id, searching all locations.
    pub fn device_by_id(&self, id: &str) -> Option<&Device> {
        self.locations
            .iter()
            .flat_map(|l| &l.devices)
            .find(|d| d.id == id)
    }

    /// First device with the given name. Name uniqueness within a location
    /// is assumed, not enforced.
    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.locations
            .iter()
            .flat_map(|l| &l.devices)
            .find(|d| d.name == name)
    }

    /// First domestic hot-water device, if the installation has one.
    pub fn hot_water(&self) -> Option<&Device> {
        self.locations
            .iter()
            .flat_map(|l| &l.devices)
            .find(|d| d.kind == DeviceKind::HotWater)
    }

    /// One reading per device, derived from this snapshot.
    pub fn temperatures(&self) -> impl Iterator<Item = TemperatureReading> + '_ {
        self.locations
            .iter()
            .flat_map(|l| &l.devices)
            .map(|d| TemperatureReading {
                id: d.id.clone(),
                name: d.name.clone(),
                kind: d.kind,
                temperature: d.temperature,
                setpoint: d.setpoint,
            })
    }
}

/// Current state of one device, as reported at discovery time.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReading {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub temperature: Option<f64>,
    /// Absent for hot-water devices.
    pub setpoint: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub condition: String,
    pub units: String,
    pub phrase: String,
}

/// Server-side handle for a submitted command. Discarded once terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
}

/// Controls how task completion is polled.
///
/// The default preserves the service's observed contract: a fixed 1 s
/// interval and no bound, so a task the service never completes blocks the
/// caller indefinitely. Set `timeout` to bound the wait with
/// [`Error::TaskTimeout`](crate::Error::TaskTimeout), or drop the
/// `await_completion` future to cancel between polls.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Zone addressed by service id or by display name.
#[derive(Debug, Clone, Copy)]
pub enum ZoneRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Comparison rule at switchpoint boundaries during override detection.
///
/// Observed revisions of the service's own client disagree on whether the
/// boundary comparisons are strict; both behaviors are kept selectable
/// rather than silently picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryRule {
    /// Strict `<` / `>` comparisons.
    #[default]
    Exclusive,
    /// `<=` / `>=` comparisons.
    Inclusive,
}

/// A scheduled setpoint change within a day.
///
/// Heating zones carry a target temperature, hot-water devices an on/off
/// state; exactly one of the two is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Switchpoint {
    pub time_of_day: NaiveTime,
    pub temperature: Option<f64>,
    pub dhw_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u8,
    /// Ascending by time of day; the ordering is load-bearing for
    /// override detection.
    pub switchpoints: Vec<Switchpoint>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeeklySchedule {
    pub days: Vec<DailySchedule>,
}

impl WeeklySchedule {
    pub fn day(&self, day_of_week: u8) -> Option<&DailySchedule> {
        self.days.iter().find(|d| d.day_of_week == day_of_week)
    }
}
