//! Date arithmetic for watering schedules. Everything here is pure.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::models::{StatusKind, WateringSchedule, WateringStatus};

/// When the plant is next due: `last_watered` plus `frequency_days` calendar
/// days, keeping the time of day.
pub fn next_due_date(schedule: &WateringSchedule) -> NaiveDateTime {
    add_days(schedule.last_watered, u64::from(schedule.frequency_days.get()))
}

/// Calendar-day addition, saturating at the end of the representable range.
pub(crate) fn add_days(at: NaiveDateTime, days: u64) -> NaiveDateTime {
    at.checked_add_days(Days::new(days)).unwrap_or(NaiveDateTime::MAX)
}

/// `last_watered` moved forward by `days`. `None` when the new date or the
/// due date after it falls outside the representable range.
pub fn snoozed_last_watered(schedule: &WateringSchedule, days: u32) -> Option<NaiveDateTime> {
    let moved = schedule.last_watered.checked_add_days(Days::new(u64::from(days)))?;
    moved.checked_add_days(Days::new(u64::from(schedule.frequency_days.get())))?;
    Some(moved)
}

/// Whole days from `today` to `next`, both taken at midnight. Negative when
/// the date has already passed.
pub fn days_until(next: NaiveDateTime, today: NaiveDate) -> i64 {
    (next.date() - today).num_days()
}

/// Map a day count to its urgency bucket. `None` means the plant has no schedule.
///
/// The order of these checks and their boundaries are fixed.
pub fn classify(days: Option<i64>) -> WateringStatus {
    let (status, text) = match days {
        None => (StatusKind::None, "No schedule".to_string()),
        Some(d) if d < 0 => (StatusKind::Overdue, "Overdue!".to_string()),
        Some(0) => (StatusKind::DueToday, "Water today".to_string()),
        Some(1) => (StatusKind::DueTomorrow, "Water tomorrow".to_string()),
        Some(d) if d <= 3 => (StatusKind::DueSoon, format!("{} days", d)),
        Some(d) => (StatusKind::Scheduled, format!("{} days", d)),
    };
    WateringStatus { status, text }
}

pub fn status(schedule: Option<&WateringSchedule>, today: NaiveDate) -> WateringStatus {
    classify(schedule.map(|s| days_until(next_due_date(s), today)))
}
