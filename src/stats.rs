//! Watering consistency and collection-level counters.

use chrono::NaiveDateTime;

use crate::models::{CollectionSummary, ConsistencyStat, HistoryEntry, Plant, WateringSchedule};
use crate::schedule::next_due_date;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Compare the actual intervals between waterings with the configured one.
///
/// `history` must be newest first. Returns `None` with fewer than two
/// entries. The percentage is not clamped: a very erratic history can score
/// below zero.
pub fn consistency<'a>(
    schedule: &WateringSchedule,
    history: impl IntoIterator<Item = &'a HistoryEntry>,
) -> Option<ConsistencyStat> {
    let dates: Vec<NaiveDateTime> = history.into_iter().map(|entry| entry.date).collect();
    if dates.len() < 2 {
        return None;
    }

    let total_days: f64 = dates
        .windows(2)
        .map(|pair| (pair[0] - pair[1]).num_milliseconds() as f64 / MILLIS_PER_DAY)
        .sum();
    let average = total_days / (dates.len() - 1) as f64;
    let scheduled = f64::from(schedule.frequency_days.get());

    Some(ConsistencyStat {
        total_waterings: dates.len(),
        average_interval_days: round_half_up(average),
        scheduled_interval_days: schedule.frequency_days.get(),
        consistency_percent: round_half_up((1.0 - (average - scheduled).abs() / scheduled) * 100.0),
        last_watered: dates[0],
        next_watering: next_due_date(schedule),
    })
}

// Halves round towards positive infinity, so -2.5 becomes -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Counters for a dashboard overview.
///
/// `needs_water` counts plants whose free-text notes mention "water" or
/// "thirsty". It does not look at schedules; see [`crate::schedule::status`]
/// for that.
pub fn collection_summary(plants: &[Plant]) -> CollectionSummary {
    let needs_water = plants
        .iter()
        .filter(|plant| {
            plant.notes.as_deref().is_some_and(|notes| {
                let notes = notes.to_lowercase();
                notes.contains("water") || notes.contains("thirsty")
            })
        })
        .count();
    let low_light = plants
        .iter()
        .filter(|plant| plant.light.as_deref() == Some("low"))
        .count();

    CollectionSummary {
        total: plants.len(),
        needs_water,
        low_light,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};
    use std::num::NonZeroU32;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn schedule(frequency: u32) -> WateringSchedule {
        WateringSchedule {
            frequency_days: NonZeroU32::new(frequency).unwrap(),
            last_watered: start(),
            reminder_time: "09:00".to_string(),
            custom_days: None,
            notes: String::new(),
        }
    }

    /// Builds a newest-first history from offsets in days after `start()`.
    fn history(offsets: &[i64]) -> Vec<HistoryEntry> {
        offsets
            .iter()
            .rev()
            .map(|days| HistoryEntry::watered(start() + TimeDelta::days(*days), ""))
            .collect()
    }

    #[test]
    fn test_needs_two_entries() {
        assert!(consistency(&schedule(7), &history(&[])).is_none());
        assert!(consistency(&schedule(7), &history(&[0])).is_none());
    }

    #[test]
    fn test_on_schedule_is_100() {
        let stat = consistency(&schedule(7), &history(&[0, 7, 14, 21])).unwrap();
        assert_eq!(stat.total_waterings, 4);
        assert_eq!(stat.average_interval_days, 7);
        assert_eq!(stat.scheduled_interval_days, 7);
        assert_eq!(stat.consistency_percent, 100);
        assert_eq!(stat.last_watered, start() + TimeDelta::days(21));
    }

    #[test]
    fn test_late_waterings_lower_the_score() {
        // average 10.5 days against a 7 day schedule
        let stat = consistency(&schedule(7), &history(&[0, 10, 21])).unwrap();
        assert_eq!(stat.average_interval_days, 11);
        assert_eq!(stat.consistency_percent, 50);
    }

    #[test]
    fn test_score_can_go_negative() {
        let stat = consistency(&schedule(2), &history(&[0, 10])).unwrap();
        assert_eq!(stat.consistency_percent, -300);
    }

    #[test]
    fn test_partial_days_count() {
        let entries = vec![
            HistoryEntry::watered(start() + TimeDelta::hours(36), ""),
            HistoryEntry::watered(start(), ""),
        ];
        let stat = consistency(&schedule(1), &entries).unwrap();
        assert_eq!(stat.average_interval_days, 2);
        assert_eq!(stat.consistency_percent, 50);
    }

    #[test]
    fn test_next_watering_comes_from_schedule() {
        let stat = consistency(&schedule(5), &history(&[0, 5])).unwrap();
        assert_eq!(stat.next_watering, start() + TimeDelta::days(5));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
    }

    fn plant(id: i64, notes: Option<&str>, light: Option<&str>) -> Plant {
        Plant {
            id,
            name: format!("plant {}", id),
            plant_type: "succulent".to_string(),
            notes: notes.map(str::to_string),
            light: light.map(str::to_string),
            watering_schedule: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_collection_summary_uses_notes_keywords() {
        let plants = vec![
            plant(1, Some("Looks THIRSTY"), Some("low")),
            plant(2, Some("needs water on Fridays"), None),
            plant(3, Some("repotted"), Some("low")),
            plant(4, None, Some("bright")),
        ];
        let summary = collection_summary(&plants);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.needs_water, 2);
        assert_eq!(summary.low_light, 2);
    }
}
