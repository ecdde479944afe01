//! One derived reminder per plant.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{PlantId, Reminder, ReminderKind, WateringSchedule};
use crate::schedule::{days_until, next_due_date};

/// Reminders keyed by plant id. Persisted as a plain sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Reminder>", into = "Vec<Reminder>")]
pub struct ReminderRegistry {
    reminders: BTreeMap<PlantId, Reminder>,
}

impl From<Vec<Reminder>> for ReminderRegistry {
    // Later records win, so a sequence that somehow holds duplicates still
    // collapses to one reminder per plant.
    fn from(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: reminders.into_iter().map(|r| (r.plant_id, r)).collect(),
        }
    }
}

impl From<ReminderRegistry> for Vec<Reminder> {
    fn from(registry: ReminderRegistry) -> Self {
        registry.reminders.into_values().collect()
    }
}

impl ReminderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever reminder `plant_id` had with a fresh, enabled one
    /// derived from `schedule`.
    pub fn upsert(&mut self, plant_id: PlantId, plant_name: &str, schedule: &WateringSchedule) -> &Reminder {
        let reminder = Reminder {
            plant_id,
            plant_name: plant_name.to_string(),
            kind: ReminderKind::Watering,
            due_date: next_due_date(schedule),
            time: schedule.reminder_time.clone(),
            enabled: true,
        };
        self.reminders.insert(plant_id, reminder);
        &self.reminders[&plant_id]
    }

    /// Enabled reminders that are due on `today` or earlier.
    pub fn check_due(&self, today: NaiveDate) -> impl Iterator<Item = &Reminder> + '_ {
        self.reminders
            .values()
            .filter(move |r| r.enabled && days_until(r.due_date, today) <= 0)
    }

    pub fn remove(&mut self, plant_id: PlantId) -> Option<Reminder> {
        self.reminders.remove(&plant_id)
    }

    /// Returns false when the plant has no reminder.
    pub fn set_enabled(&mut self, plant_id: PlantId, enabled: bool) -> bool {
        match self.reminders.get_mut(&plant_id) {
            Some(reminder) => {
                reminder.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, plant_id: PlantId) -> Option<&Reminder> {
        self.reminders.get(&plant_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reminder> + '_ {
        self.reminders.values()
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(PlantId) -> bool) {
        self.reminders.retain(|id, _| keep(*id));
    }

    /// A copy holding only one plant's reminder.
    pub fn only(&self, plant_id: PlantId) -> Self {
        Self {
            reminders: self
                .reminders
                .get(&plant_id)
                .map(|r| BTreeMap::from([(plant_id, r.clone())]))
                .unwrap_or_default(),
        }
    }
}
