//! Per-plant watering history, newest first and capped.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::models::{HistoryEntry, PlantId};

/// Maximum number of entries kept per plant.
pub const HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WateringHistoryLog {
    entries: BTreeMap<PlantId, VecDeque<HistoryEntry>>,
}

impl WateringHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry as the newest for `plant_id`, evicting the oldest
    /// beyond [`HISTORY_CAP`].
    pub fn append(&mut self, plant_id: PlantId, entry: HistoryEntry) {
        let log = self.entries.entry(plant_id).or_default();
        log.push_front(entry);
        log.truncate(HISTORY_CAP);
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn get(&self, plant_id: PlantId, limit: usize) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries
            .get(&plant_id)
            .into_iter()
            .flat_map(|log| log.iter())
            .take(limit)
    }

    pub fn len(&self, plant_id: PlantId) -> usize {
        self.entries.get(&plant_id).map_or(0, VecDeque::len)
    }

    /// Drop all history for a plant. Returns whether anything was removed.
    pub fn purge(&mut self, plant_id: PlantId) -> bool {
        self.entries.remove(&plant_id).is_some()
    }

    pub fn plant_ids(&self) -> impl Iterator<Item = PlantId> + '_ {
        self.entries.keys().copied()
    }

    /// Keep only the plants for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(PlantId) -> bool) {
        self.entries.retain(|id, _| keep(*id));
    }

    /// A copy holding only one plant's history.
    pub fn only(&self, plant_id: PlantId) -> Self {
        let entries = self
            .entries
            .get(&plant_id)
            .map(|log| BTreeMap::from([(plant_id, log.clone())]))
            .unwrap_or_default();
        Self { entries }
    }

    /// Re-apply the cap to logs that were loaded from storage.
    pub(crate) fn enforce_cap(&mut self) -> bool {
        let mut truncated = false;
        for log in self.entries.values_mut() {
            if log.len() > HISTORY_CAP {
                log.truncate(HISTORY_CAP);
                truncated = true;
            }
        }
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap() + TimeDelta::days(n)
    }

    #[test]
    fn test_append_is_newest_first() {
        let mut log = WateringHistoryLog::new();
        log.append(1, HistoryEntry::watered(day(0), "first"));
        log.append(1, HistoryEntry::watered(day(3), "second"));

        let notes: Vec<&str> = log.get(1, 10).map(|e| e.notes.as_str()).collect();
        assert_eq!(notes, vec!["second", "first"]);
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut log = WateringHistoryLog::new();
        for n in 0..=HISTORY_CAP as i64 {
            log.append(1, HistoryEntry::watered(day(n), &format!("#{}", n)));
        }

        assert_eq!(log.len(1), HISTORY_CAP);
        let entries: Vec<&HistoryEntry> = log.get(1, usize::MAX).collect();
        assert_eq!(entries.first().unwrap().notes, "#100");
        assert_eq!(entries.last().unwrap().notes, "#1");
        assert!(entries.iter().all(|e| e.notes != "#0"));
        assert!(entries.windows(2).all(|pair| pair[0].date > pair[1].date));
    }

    #[test]
    fn test_get_respects_limit_and_restarts() {
        let mut log = WateringHistoryLog::new();
        for n in 0..5 {
            log.append(4, HistoryEntry::watered(day(n), ""));
        }

        assert_eq!(log.get(4, 2).count(), 2);
        assert_eq!(log.get(4, 2).next().unwrap().date, day(4));
        log.append(4, HistoryEntry::watered(day(9), ""));
        assert_eq!(log.get(4, 2).next().unwrap().date, day(9));
    }

    #[test]
    fn test_unknown_plant_is_empty() {
        let log = WateringHistoryLog::new();
        assert_eq!(log.get(42, 20).count(), 0);
        assert_eq!(log.len(42), 0);
    }

    #[test]
    fn test_purge() {
        let mut log = WateringHistoryLog::new();
        log.append(1, HistoryEntry::watered(day(0), ""));
        log.append(2, HistoryEntry::watered(day(0), ""));

        assert!(log.purge(1));
        assert!(!log.purge(1));
        assert_eq!(log.plant_ids().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_persisted_form_is_a_map_of_sequences() {
        let mut log = WateringHistoryLog::new();
        log.append(12, HistoryEntry::watered(day(0), "soak"));

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["12"][0]["action"], "watered");
        assert_eq!(json["12"][0]["notes"], "soak");

        let restored: WateringHistoryLog = serde_json::from_value(json).unwrap();
        assert_eq!(restored, log);
    }

    #[test]
    fn test_enforce_cap_on_oversized_log() {
        let entries: VecDeque<HistoryEntry> =
            (0..120).map(|n| HistoryEntry::watered(day(120 - n), "")).collect();
        let mut log = WateringHistoryLog {
            entries: BTreeMap::from([(1, entries)]),
        };

        assert!(log.enforce_cap());
        assert_eq!(log.len(1), HISTORY_CAP);
        assert_eq!(log.get(1, 1).next().unwrap().date, day(120));
    }
}
