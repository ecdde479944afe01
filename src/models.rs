use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::{local_epoch_millis, wall_clock};

pub type PlantId = i64;

/// A plant record as stored by the surrounding application.
///
/// The engine only owns `watering_schedule`; every field it does not know
/// about is carried in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: PlantId,
    pub name: String,
    #[serde(rename = "type")]
    pub plant_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watering_schedule: Option<WateringSchedule>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WateringSchedule {
    #[serde(alias = "frequency")]
    pub frequency_days: NonZeroU32,
    #[serde(with = "wall_clock")]
    pub last_watered: NaiveDateTime,
    #[serde(default = "default_reminder_time")]
    pub reminder_time: String, // HH:MM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_days: Option<BTreeSet<Weekday>>,
    #[serde(default)]
    pub notes: String,
}

fn default_reminder_time() -> String {
    "09:00".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(Weekday::Monday),
            "tue" | "tues" | "tuesday" => Ok(Weekday::Tuesday),
            "wed" | "wednesday" => Ok(Weekday::Wednesday),
            "thu" | "thurs" | "thursday" => Ok(Weekday::Thursday),
            "fri" | "friday" => Ok(Weekday::Friday),
            "sat" | "saturday" => Ok(Weekday::Saturday),
            "sun" | "sunday" => Ok(Weekday::Sunday),
            other => Err(format!("Unknown weekday: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Watering,
}

/// The engine-owned reminder derived from a plant's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub plant_id: PlantId,
    pub plant_name: String,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    #[serde(with = "wall_clock")]
    pub due_date: NaiveDateTime,
    pub time: String, // HH:MM
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Watered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(with = "wall_clock")]
    pub date: NaiveDateTime,
    pub action: HistoryAction,
    #[serde(default)]
    pub notes: String,
    pub timestamp: i64, // epoch milliseconds of `date` in local time
}

impl HistoryEntry {
    pub fn watered(at: NaiveDateTime, notes: &str) -> Self {
        Self {
            date: at,
            action: HistoryAction::Watered,
            notes: notes.to_string(),
            timestamp: local_epoch_millis(at),
        }
    }
}

/// Urgency bucket for a plant's next watering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    None,
    Overdue,
    DueToday,
    DueTomorrow,
    DueSoon,
    Scheduled,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::None => "none",
            StatusKind::Overdue => "overdue",
            StatusKind::DueToday => "dueToday",
            StatusKind::DueTomorrow => "dueTomorrow",
            StatusKind::DueSoon => "dueSoon",
            StatusKind::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringStatus {
    pub status: StatusKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyStat {
    pub total_waterings: usize,
    pub average_interval_days: i64,
    pub scheduled_interval_days: u32,
    pub consistency_percent: i64,
    #[serde(with = "wall_clock")]
    pub last_watered: NaiveDateTime,
    #[serde(with = "wall_clock")]
    pub next_watering: NaiveDateTime,
}

/// Dashboard counters. `needs_water` is a notes keyword heuristic and is
/// unrelated to schedule status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub total: usize,
    pub needs_water: usize,
    pub low_light: usize,
}

/// Caller-supplied schedule fields; anything missing is filled in by the engine.
#[derive(Debug, Clone, Default)]
pub struct ScheduleInput {
    pub frequency_days: Option<i64>,
    pub last_watered: Option<NaiveDateTime>,
    pub reminder_time: Option<String>,
    pub custom_days: Option<BTreeSet<Weekday>>,
    pub notes: Option<String>,
}

impl ScheduleInput {
    pub fn every(days: i64) -> Self {
        Self {
            frequency_days: Some(days),
            ..Self::default()
        }
    }

    pub fn last_watered(mut self, at: NaiveDateTime) -> Self {
        self.last_watered = Some(at);
        self
    }

    pub fn reminder_time(mut self, time: impl Into<String>) -> Self {
        self.reminder_time = Some(time.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewPlant {
    pub name: String,
    pub plant_type: String,
    pub notes: Option<String>,
    pub light: Option<String>,
    pub schedule: Option<ScheduleInput>,
}

impl NewPlant {
    pub fn new(name: impl Into<String>, plant_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plant_type: plant_type.into(),
            notes: None,
            light: None,
            schedule: None,
        }
    }
}
