use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::types::{BoundaryRule, DailySchedule, Switchpoint, WeeklySchedule};
use crate::{Error, Result};

/// Key map applied to schedule payloads before structural parsing. The
/// service returns camelCase names; the normalized form is PascalCase.
const KEY_MAP: &[(&str, &str)] = &[
    ("dailySchedules", "DailySchedules"),
    ("dayOfWeek", "DayOfWeek"),
    ("temperature", "TargetTemperature"),
    ("timeOfDay", "TimeOfDay"),
    ("switchpoints", "Switchpoints"),
    ("dhwState", "DhwState"),
];

const TIME_FORMAT: &str = "%H:%M:%S";

/// Renames mapped keys recursively. Applied at key granularity (values are
/// never touched), and a no-op on input that is already normalized.
fn normalize_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                let renamed = KEY_MAP
                    .iter()
                    .find(|(from, _)| from == key)
                    .map(|(_, to)| (*to).to_string())
                    .unwrap_or_else(|| key.clone());
                out.insert(renamed, normalize_keys(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
        other => other.clone(),
    }
}

#[derive(Deserialize)]
struct WireSchedule {
    #[serde(rename = "DailySchedules")]
    daily_schedules: Vec<WireDay>,
}

// DayOfWeek is deliberately not read: the day index comes from the
// response ordering (Monday-first), never from the embedded value.
#[derive(Deserialize)]
struct WireDay {
    #[serde(rename = "Switchpoints")]
    switchpoints: Vec<WireSwitchpoint>,
}

#[derive(Deserialize)]
struct WireSwitchpoint {
    #[serde(rename = "TimeOfDay")]
    time_of_day: String,
    #[serde(default, rename = "TargetTemperature")]
    target_temperature: Option<f64>,
    #[serde(default, rename = "DhwState")]
    dhw_state: Option<String>,
}

/// Decodes a raw schedule payload into the normalized weekly form.
pub fn decode(raw: &Value) -> Result<WeeklySchedule> {
    let normalized = normalize_keys(raw);
    let wire: WireSchedule = serde_json::from_value(normalized)
        .map_err(|e| Error::InvalidScheduleData(e.to_string()))?;

    let mut days = Vec::with_capacity(wire.daily_schedules.len());
    for (day_of_week, day) in wire.daily_schedules.into_iter().enumerate() {
        let mut switchpoints = Vec::with_capacity(day.switchpoints.len());
        for sp in day.switchpoints {
            let time_of_day = NaiveTime::parse_from_str(&sp.time_of_day, TIME_FORMAT)
                .map_err(|_| {
                    Error::InvalidScheduleData(format!("bad time of day: {}", sp.time_of_day))
                })?;
            switchpoints.push(Switchpoint {
                time_of_day,
                temperature: sp.target_temperature,
                dhw_state: sp.dhw_state,
            });
        }
        days.push(DailySchedule {
            day_of_week: day_of_week as u8,
            switchpoints,
        });
    }
    Ok(WeeklySchedule { days })
}

/// Encodes a weekly schedule back into the wire form, validating it first.
pub fn encode(schedule: &WeeklySchedule) -> Result<Value> {
    let mut daily = Vec::with_capacity(schedule.days.len());
    for (index, day) in schedule.days.iter().enumerate() {
        if day.day_of_week as usize != index || day.day_of_week > 6 {
            return Err(Error::InvalidScheduleData(format!(
                "day index {} out of order (position {index})",
                day.day_of_week
            )));
        }
        let mut switchpoints = Vec::with_capacity(day.switchpoints.len());
        for pair in day.switchpoints.windows(2) {
            if pair[0].time_of_day >= pair[1].time_of_day {
                return Err(Error::InvalidScheduleData(format!(
                    "switchpoints not ascending on day {}",
                    day.day_of_week
                )));
            }
        }
        for sp in &day.switchpoints {
            let time = sp.time_of_day.format(TIME_FORMAT).to_string();
            let entry = match (&sp.temperature, &sp.dhw_state) {
                (Some(temp), None) => json!({"TimeOfDay": time, "TargetTemperature": temp}),
                (None, Some(state)) => json!({"TimeOfDay": time, "DhwState": state}),
                _ => {
                    return Err(Error::InvalidScheduleData(format!(
                        "switchpoint at {time} must carry exactly one of temperature or DHW state"
                    )));
                }
            };
            switchpoints.push(entry);
        }
        daily.push(json!({
            "DayOfWeek": day.day_of_week,
            "Switchpoints": switchpoints,
        }));
    }
    Ok(json!({ "DailySchedules": daily }))
}

fn earlier(a: NaiveTime, b: NaiveTime, rule: BoundaryRule) -> bool {
    match rule {
        BoundaryRule::Exclusive => a < b,
        BoundaryRule::Inclusive => a <= b,
    }
}

fn later(a: NaiveTime, b: NaiveTime, rule: BoundaryRule) -> bool {
    match rule {
        BoundaryRule::Exclusive => a > b,
        BoundaryRule::Inclusive => a >= b,
    }
}

/// Temperature the schedule prescribes for the given time of day.
///
/// Walks the day's switchpoints in ascending order from a midnight/0.0
/// baseline: an instant strictly inside the gap before the next switchpoint
/// takes the most recently passed temperature; an instant past a
/// switchpoint takes that switchpoint's temperature. An instant the walk
/// never resolves (boundary instants, empty days) falls back to the
/// tracked baseline.
pub fn scheduled_temperature(
    switchpoints: &[Switchpoint],
    now: NaiveTime,
    rule: BoundaryRule,
) -> f64 {
    let mut last_time = NaiveTime::MIN;
    let mut last_temp = 0.0_f64;

    for sp in switchpoints {
        let sp_temp = sp.temperature.unwrap_or_default();
        if earlier(last_time, now, rule) && earlier(now, sp.time_of_day, rule) {
            return last_temp;
        } else if later(now, sp.time_of_day, rule) {
            return sp_temp;
        }
        last_time = sp.time_of_day;
        last_temp = sp_temp;
    }
    last_temp
}

/// Whether a zone's live setpoint deviates from its weekly schedule at the
/// given instant. Deterministic for a fixed (schedule, setpoint, instant).
///
/// The instant's weekday indexes the schedule directly; the location's UTC
/// offset is not applied.
pub fn is_overridden(
    schedule: &WeeklySchedule,
    live_setpoint: f64,
    now: NaiveDateTime,
    rule: BoundaryRule,
) -> bool {
    let weekday = now.weekday().num_days_from_monday() as u8;
    let switchpoints = schedule
        .day(weekday)
        .map(|d| d.switchpoints.as_slice())
        .unwrap_or(&[]);
    live_setpoint != scheduled_temperature(switchpoints, now.time(), rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heat(h: u32, m: u32, temp: f64) -> Switchpoint {
        Switchpoint {
            time_of_day: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            temperature: Some(temp),
            dhw_state: None,
        }
    }

    #[test]
    fn normalize_renames_known_keys_only() {
        let raw = json!({
            "dailySchedules": [{
                "dayOfWeek": "Monday",
                "switchpoints": [{"timeOfDay": "06:00:00", "temperature": 18.0}]
            }],
            "other": 1
        });
        let normalized = normalize_keys(&raw);
        let day = &normalized["DailySchedules"][0];
        assert_eq!(day["DayOfWeek"], "Monday");
        assert_eq!(day["Switchpoints"][0]["TimeOfDay"], "06:00:00");
        assert_eq!(day["Switchpoints"][0]["TargetTemperature"], 18.0);
        assert_eq!(normalized["other"], 1);
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!({
            "DailySchedules": [{
                "DayOfWeek": 0,
                "Switchpoints": [{"TimeOfDay": "06:00:00", "TargetTemperature": 18.0}]
            }]
        });
        assert_eq!(normalize_keys(&raw), raw);
    }

    #[test]
    fn decode_assigns_day_index_from_position() {
        // Embedded day names are ignored; position wins.
        let raw = json!({
            "dailySchedules": [
                {"dayOfWeek": "Sunday", "switchpoints": []},
                {"dayOfWeek": "Sunday", "switchpoints": []}
            ]
        });
        let schedule = decode(&raw).unwrap();
        assert_eq!(schedule.days[0].day_of_week, 0);
        assert_eq!(schedule.days[1].day_of_week, 1);
    }

    #[test]
    fn decode_rejects_bad_time() {
        let raw = json!({
            "dailySchedules": [
                {"switchpoints": [{"timeOfDay": "6am", "temperature": 18.0}]}
            ]
        });
        assert!(matches!(
            decode(&raw),
            Err(Error::InvalidScheduleData(_))
        ));
    }

    #[test]
    fn encode_rejects_unsorted_switchpoints() {
        let schedule = WeeklySchedule {
            days: vec![DailySchedule {
                day_of_week: 0,
                switchpoints: vec![heat(22, 0, 15.0), heat(6, 0, 18.0)],
            }],
        };
        assert!(matches!(
            encode(&schedule),
            Err(Error::InvalidScheduleData(_))
        ));
    }

    #[test]
    fn encode_rejects_valueless_switchpoint() {
        let schedule = WeeklySchedule {
            days: vec![DailySchedule {
                day_of_week: 0,
                switchpoints: vec![Switchpoint {
                    time_of_day: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                    temperature: None,
                    dhw_state: None,
                }],
            }],
        };
        assert!(matches!(
            encode(&schedule),
            Err(Error::InvalidScheduleData(_))
        ));
    }

    #[test]
    fn encode_rejects_out_of_order_days() {
        let schedule = WeeklySchedule {
            days: vec![DailySchedule {
                day_of_week: 3,
                switchpoints: vec![],
            }],
        };
        assert!(matches!(
            encode(&schedule),
            Err(Error::InvalidScheduleData(_))
        ));
    }

    #[test]
    fn dhw_switchpoints_roundtrip() {
        let schedule = WeeklySchedule {
            days: vec![DailySchedule {
                day_of_week: 0,
                switchpoints: vec![Switchpoint {
                    time_of_day: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
                    temperature: None,
                    dhw_state: Some("On".to_string()),
                }],
            }],
        };
        let encoded = encode(&schedule).unwrap();
        assert_eq!(
            encoded["DailySchedules"][0]["Switchpoints"][0]["DhwState"],
            "On"
        );
        assert_eq!(decode(&encoded).unwrap(), schedule);
    }
}
