use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::types::{
    Device, DeviceKind, HotWaterState, Location, SystemMode, WeatherSnapshot,
};

/// Application identifier sent with every authentication call.
pub const DEFAULT_APP_ID: &str = "91db1612-73fd-4500-91b2-e63b069b185c";

/// The only terminal task state the service is known to report.
pub const TASK_SUCCEEDED: &str = "Succeeded";

const DAY_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which generation of the service API to speak.
///
/// The two generations differ in authentication style, resource layout and
/// mode encoding; everything else (task polling, override detection,
/// schedule handling) is shared and parameterized over this adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiProfile {
    /// Original WebAPI: `sessionId` header, string mode tokens, flat
    /// per-location device list.
    Legacy,
    /// EMEA API: bearer token, numeric mode codes, location → gateway →
    /// control-system → zone tree.
    #[default]
    Emea,
}

impl ApiProfile {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ApiProfile::Legacy => "https://rs.alarmnet.com/TotalConnectComfort/WebAPI/api",
            ApiProfile::Emea => "https://rs.alarmnet.com/TotalConnectComfort/WebAPI/emea/api/v1",
        }
    }

    pub fn auth_path(&self) -> &'static str {
        match self {
            ApiProfile::Legacy => "/Session",
            ApiProfile::Emea => "/Auth",
        }
    }

    pub fn locations_path(&self, user_id: &str) -> String {
        match self {
            ApiProfile::Legacy => format!("/locations?userId={user_id}&allData=True"),
            ApiProfile::Emea => format!(
                "/location/installationInfo?userId={user_id}&includeTemperatureControlSystems=True"
            ),
        }
    }

    /// Target is the location id on the legacy API, the control-system id
    /// on the EMEA API.
    pub fn system_mode_path(&self, target_id: &str) -> String {
        match self {
            ApiProfile::Legacy => format!("/evoTouchSystems?locationId={target_id}"),
            ApiProfile::Emea => format!("/temperatureControlSystem/{target_id}/mode"),
        }
    }

    pub fn setpoint_path(&self, zone_id: &str) -> String {
        match self {
            ApiProfile::Legacy => {
                format!("/devices/{zone_id}/thermostat/changeableValues/heatSetpoint")
            }
            ApiProfile::Emea => format!("/temperatureZone/{zone_id}/heatSetpoint"),
        }
    }

    pub fn hot_water_path(&self, dhw_id: &str) -> String {
        match self {
            ApiProfile::Legacy => format!("/devices/{dhw_id}/thermostat/changeableValues"),
            ApiProfile::Emea => format!("/domesticHotWater/{dhw_id}/state"),
        }
    }

    pub fn schedule_path(&self, kind: DeviceKind, id: &str) -> String {
        match self {
            ApiProfile::Legacy => format!("/devices/{id}/thermostat/schedule"),
            ApiProfile::Emea => match kind {
                DeviceKind::HeatingZone => format!("/temperatureZone/{id}/schedule"),
                DeviceKind::HotWater => format!("/domesticHotWater/{id}/schedule"),
            },
        }
    }

    pub fn task_status_path(&self, task_id: &str) -> String {
        match self {
            ApiProfile::Legacy => format!("/commTasks?commTaskId={task_id}"),
            ApiProfile::Emea => format!("/commTasks/{task_id}"),
        }
    }

    /// Wire encoding of a system mode: numeric code or string token.
    pub fn mode_value(&self, mode: SystemMode) -> Value {
        match self {
            ApiProfile::Legacy => json!(mode.as_token()),
            ApiProfile::Emea => json!(mode.as_code()),
        }
    }
}

// -- Command payloads --

pub fn auth_body(username: &str, password: &str, app_id: &str) -> Value {
    json!({
        "Username": username,
        "Password": password,
        "ApplicationId": app_id,
    })
}

/// `until` is whole-day granularity for system modes; absent means a
/// permanent change.
pub fn system_mode_data(profile: ApiProfile, mode: SystemMode, until: Option<NaiveDate>) -> Value {
    match until {
        None => json!({
            "SystemMode": profile.mode_value(mode),
            "TimeUntil": null,
            "Permanent": true,
        }),
        Some(day) => json!({
            "SystemMode": profile.mode_value(mode),
            "TimeUntil": format!("{}T00:00:00Z", day.format(DAY_FORMAT)),
            "Permanent": false,
        }),
    }
}

pub fn setpoint_data(profile: ApiProfile, value: f64, until: Option<NaiveDateTime>) -> Value {
    match profile {
        ApiProfile::Legacy => match until {
            None => json!({"Value": value, "Status": "Hold", "NextTime": null}),
            Some(t) => json!({
                "Value": value,
                "Status": "Temporary",
                "NextTime": t.format(DATETIME_FORMAT).to_string(),
            }),
        },
        ApiProfile::Emea => match until {
            None => json!({"HeatSetpointValue": value, "SetpointMode": 1, "TimeUntil": null}),
            Some(t) => json!({
                "HeatSetpointValue": value,
                "SetpointMode": 2,
                "TimeUntil": t.format(DATETIME_FORMAT).to_string(),
            }),
        },
    }
}

/// Puts the zone back on schedule.
pub fn cancel_override_data(profile: ApiProfile) -> Value {
    match profile {
        ApiProfile::Legacy => json!({"Value": null, "Status": "Scheduled", "NextTime": null}),
        ApiProfile::Emea => json!({"HeatSetpointValue": 0.0, "SetpointMode": 0, "TimeUntil": null}),
    }
}

pub fn hot_water_data(
    profile: ApiProfile,
    state: HotWaterState,
    until: Option<NaiveDateTime>,
) -> Value {
    let next = until.map(|t| t.format(DATETIME_FORMAT).to_string());
    match profile {
        ApiProfile::Legacy => {
            let (mode, status) = match state {
                HotWaterState::On => (json!("DHWOn"), "Hold"),
                HotWaterState::Off => (json!("DHWOff"), "Hold"),
                HotWaterState::Auto => (Value::Null, "Scheduled"),
            };
            json!({
                "Mode": mode,
                "SpecialModes": null,
                "HeatSetpoint": null,
                "CoolSetpoint": null,
                "Status": status,
                "NextTime": next,
            })
        }
        ApiProfile::Emea => {
            let (dhw_state, mode) = match state {
                HotWaterState::On => (json!("On"), override_mode(until.is_some())),
                HotWaterState::Off => (json!("Off"), override_mode(until.is_some())),
                HotWaterState::Auto => (Value::Null, "FollowSchedule"),
            };
            json!({
                "State": dhw_state,
                "Mode": mode,
                "UntilTime": next,
            })
        }
    }
}

fn override_mode(temporary: bool) -> &'static str {
    if temporary {
        "TemporaryOverride"
    } else {
        "PermanentOverride"
    }
}

// -- Response parsing --

/// The service returns the created task either as a bare object or as the
/// first element of a list; the id itself may be a number or a string.
pub fn extract_task_id(body: &Value) -> Option<String> {
    let entry = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match entry.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub fn extract_task_state(body: &Value) -> Option<&str> {
    body.get("state").and_then(|v| v.as_str())
}

pub(crate) struct AuthOutcome {
    pub token: String,
    pub user_id: String,
    pub ttl: Option<Duration>,
}

#[derive(Deserialize)]
struct LegacySessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "userInfo")]
    user_info: LegacyUserInfo,
}

#[derive(Deserialize)]
struct LegacyUserInfo {
    #[serde(rename = "userID")]
    user_id: u64,
}

#[derive(Deserialize)]
struct EmeaAuthResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(rename = "userId")]
    user_id: String,
}

pub(crate) fn parse_auth_response(
    profile: ApiProfile,
    body: &Value,
) -> std::result::Result<AuthOutcome, String> {
    match profile {
        ApiProfile::Legacy => {
            let resp: LegacySessionResponse =
                serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
            Ok(AuthOutcome {
                token: resp.session_id,
                user_id: resp.user_info.user_id.to_string(),
                ttl: None,
            })
        }
        ApiProfile::Emea => {
            let resp: EmeaAuthResponse =
                serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
            Ok(AuthOutcome {
                token: resp.access_token,
                user_id: resp.user_id,
                ttl: resp.expires_in.map(Duration::from_secs),
            })
        }
    }
}

// -- Discovery wire shapes --
//
// Decoded into explicit structs so a malformed tree response (the
// expired-session signal) fails here rather than as a missing attribute
// somewhere downstream.

#[derive(Deserialize)]
struct LegacyLocation {
    #[serde(rename = "locationID")]
    location_id: u64,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "timeZone")]
    time_zone: Option<LegacyTimeZone>,
    devices: Vec<LegacyDevice>,
    #[serde(default)]
    weather: Option<WeatherSnapshot>,
}

#[derive(Deserialize)]
struct LegacyTimeZone {
    #[serde(default, rename = "currentOffsetMinutes")]
    current_offset_minutes: i32,
}

#[derive(Deserialize)]
struct LegacyDevice {
    #[serde(rename = "deviceID")]
    device_id: u64,
    #[serde(default)]
    name: String,
    #[serde(rename = "thermostatModelType")]
    thermostat_model_type: String,
    thermostat: LegacyThermostat,
}

#[derive(Deserialize)]
struct LegacyThermostat {
    #[serde(default, rename = "indoorTemperature")]
    indoor_temperature: Option<f64>,
    #[serde(default, rename = "allowedModes")]
    allowed_modes: Vec<String>,
    #[serde(default, rename = "changeableValues")]
    changeable_values: Option<LegacyChangeableValues>,
}

#[derive(Deserialize)]
struct LegacyChangeableValues {
    #[serde(default, rename = "heatSetpoint")]
    heat_setpoint: Option<LegacyHeatSetpoint>,
}

#[derive(Deserialize)]
struct LegacyHeatSetpoint {
    value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaLocation {
    location_info: EmeaLocationInfo,
    #[serde(default)]
    gateways: Vec<EmeaGateway>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaLocationInfo {
    location_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    time_zone: Option<EmeaTimeZone>,
    #[serde(default)]
    weather: Option<WeatherSnapshot>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaTimeZone {
    #[serde(default)]
    current_offset_minutes: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaGateway {
    #[serde(default)]
    temperature_control_systems: Vec<EmeaSystem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaSystem {
    system_id: String,
    #[serde(default)]
    allowed_system_modes: Vec<EmeaAllowedMode>,
    #[serde(default)]
    zones: Vec<EmeaZone>,
    #[serde(default)]
    dhw: Option<EmeaDhw>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaAllowedMode {
    system_mode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaZone {
    zone_id: String,
    name: String,
    #[serde(default)]
    temperature_status: Option<EmeaTemperatureStatus>,
    #[serde(default)]
    setpoint_status: Option<EmeaSetpointStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaTemperatureStatus {
    #[serde(default)]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaSetpointStatus {
    #[serde(default)]
    target_heat_temperature: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmeaDhw {
    dhw_id: String,
    #[serde(default)]
    temperature_status: Option<EmeaTemperatureStatus>,
}

pub(crate) fn decode_locations(
    profile: ApiProfile,
    body: &Value,
) -> std::result::Result<Vec<Location>, String> {
    match profile {
        ApiProfile::Legacy => {
            let raw: Vec<LegacyLocation> =
                serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
            Ok(raw.into_iter().map(map_legacy_location).collect())
        }
        ApiProfile::Emea => {
            let raw: Vec<EmeaLocation> =
                serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
            Ok(raw.into_iter().map(map_emea_location).collect())
        }
    }
}

fn map_legacy_location(raw: LegacyLocation) -> Location {
    let devices = raw
        .devices
        .into_iter()
        .map(|d| Device {
            id: d.device_id.to_string(),
            name: d.name,
            kind: DeviceKind::from_model_type(&d.thermostat_model_type),
            temperature: d.thermostat.indoor_temperature,
            setpoint: d
                .thermostat
                .changeable_values
                .and_then(|cv| cv.heat_setpoint)
                .map(|hs| hs.value),
            allowed_modes: d.thermostat.allowed_modes,
        })
        .collect();
    let id = raw.location_id.to_string();
    Location {
        system_id: id.clone(),
        id,
        name: raw.name,
        timezone_offset_minutes: raw
            .time_zone
            .map(|tz| tz.current_offset_minutes)
            .unwrap_or(0),
        devices,
        weather: raw.weather,
    }
}

fn map_emea_location(raw: EmeaLocation) -> Location {
    let mut devices = Vec::new();
    let mut system_id = String::new();
    for gateway in raw.gateways {
        for system in gateway.temperature_control_systems {
            if system_id.is_empty() {
                system_id = system.system_id.clone();
            }
            let allowed: Vec<String> = system
                .allowed_system_modes
                .iter()
                .map(|m| m.system_mode.clone())
                .collect();
            // Hot water first, then zones, matching the service's own
            // reporting order.
            if let Some(dhw) = system.dhw {
                devices.push(Device {
                    id: dhw.dhw_id,
                    name: String::new(),
                    kind: DeviceKind::HotWater,
                    temperature: dhw.temperature_status.and_then(|s| s.temperature),
                    setpoint: None,
                    allowed_modes: allowed.clone(),
                });
            }
            for zone in system.zones {
                devices.push(Device {
                    id: zone.zone_id,
                    name: zone.name,
                    kind: DeviceKind::HeatingZone,
                    temperature: zone.temperature_status.and_then(|s| s.temperature),
                    setpoint: zone
                        .setpoint_status
                        .and_then(|s| s.target_heat_temperature),
                    allowed_modes: allowed.clone(),
                });
            }
        }
    }
    Location {
        id: raw.location_info.location_id,
        name: raw.location_info.name,
        system_id,
        timezone_offset_minutes: raw
            .location_info
            .time_zone
            .map(|tz| tz.current_offset_minutes)
            .unwrap_or(0),
        devices,
        weather: raw.location_info.weather,
    }
}
