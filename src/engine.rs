//! The watering-schedule engine: owns the plant, history and reminder
//! collections and keeps them consistent with each other.

use std::collections::BTreeSet;
use std::num::NonZeroU32;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::backup::{self, BackupDocument};
use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::history::{HISTORY_CAP, WateringHistoryLog};
use crate::models::{
    CollectionSummary, ConsistencyStat, HistoryEntry, NewPlant, Plant, PlantId, Reminder,
    ScheduleInput, WateringSchedule, WateringStatus,
};
use crate::reminders::ReminderRegistry;
use crate::schedule::{self, next_due_date};
use crate::stats;
use crate::storage::{Collection, Storage};
use crate::utils::parse_reminder_time;

pub const DEFAULT_FREQUENCY_DAYS: NonZeroU32 = match NonZeroU32::new(7) {
    Some(days) => days,
    None => unreachable!(),
};

pub const DEFAULT_REMINDER_TIME: &str = "09:00";

/// How the engine fills in or rejects schedule input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub default_frequency_days: NonZeroU32,
    pub default_reminder_time: String,
    /// Reject a bad frequency or reminder time instead of substituting the default.
    pub strict_frequency: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_frequency_days: DEFAULT_FREQUENCY_DAYS,
            default_reminder_time: DEFAULT_REMINDER_TIME.to_string(),
            strict_frequency: false,
        }
    }
}

pub struct WateringScheduleEngine<S, C = SystemClock> {
    storage: S,
    clock: C,
    options: EngineOptions,
    plants: Vec<Plant>,
    history: WateringHistoryLog,
    reminders: ReminderRegistry,
}

impl<S: Storage, C: Clock> WateringScheduleEngine<S, C> {
    /// Load all collections from `storage` and repair derived state.
    ///
    /// A collection that can't be read or parsed starts out empty; the others
    /// are unaffected.
    pub fn open(storage: S, clock: C, options: EngineOptions) -> Result<Self, EngineError> {
        let (plants, plants_ok): (Vec<Plant>, bool) = load_collection(&storage, Collection::Plants);
        let (history, _): (WateringHistoryLog, bool) = load_collection(&storage, Collection::History);
        let (reminders, _): (ReminderRegistry, bool) = load_collection(&storage, Collection::Reminders);

        let mut engine = Self {
            storage,
            clock,
            options,
            plants,
            history,
            reminders,
        };
        engine.reconcile(plants_ok)?;
        info!(
            "Loaded {} plant(s), {} reminder(s)",
            engine.plants.len(),
            engine.reminders.len()
        );
        Ok(engine)
    }

    /// Bring reminders and history back in line with the plant list.
    ///
    /// Orphans are only pruned when the plant collection itself loaded
    /// cleanly, so a corrupt plant list never wipes the other collections.
    fn reconcile(&mut self, prune_orphans: bool) -> Result<(), EngineError> {
        let mut changed = BTreeSet::new();

        if self.history.enforce_cap() {
            changed.insert(Collection::History);
        }

        for plant in &self.plants {
            match &plant.watering_schedule {
                Some(schedule) => {
                    let current = self.reminders.get(plant.id).is_some_and(|r| {
                        r.due_date == next_due_date(schedule)
                            && r.plant_name == plant.name
                            && r.time == schedule.reminder_time
                    });
                    if !current {
                        debug!("Re-deriving reminder for plant {}", plant.id);
                        self.reminders.upsert(plant.id, &plant.name, schedule);
                        changed.insert(Collection::Reminders);
                    }
                }
                None => {
                    if self.reminders.remove(plant.id).is_some() {
                        changed.insert(Collection::Reminders);
                    }
                }
            }
        }

        if prune_orphans {
            let known: BTreeSet<PlantId> = self.plants.iter().map(|p| p.id).collect();
            let reminders_before = self.reminders.len();
            self.reminders.retain(|id| known.contains(&id));
            if self.reminders.len() != reminders_before {
                changed.insert(Collection::Reminders);
            }
            let orphaned: Vec<PlantId> = self.history.plant_ids().filter(|id| !known.contains(id)).collect();
            if !orphaned.is_empty() {
                self.history.retain(|id| known.contains(&id));
                changed.insert(Collection::History);
            }
        }

        if !changed.is_empty() {
            let changed: Vec<Collection> = changed.into_iter().collect();
            info!("Repaired {} collection(s) on load", changed.len());
            self.persist(&changed)?;
        }
        Ok(())
    }

    // === Mutations ===

    /// Add a plant with the next free id, creating its reminder if it comes
    /// with a schedule.
    pub fn add_plant(&mut self, new_plant: NewPlant) -> Result<Plant, EngineError> {
        let now = self.clock.now();
        let id = self.next_id();
        let watering_schedule = match new_plant.schedule {
            Some(input) => Some(self.build_schedule(input, now)?),
            None => None,
        };

        let plant = Plant {
            id,
            name: new_plant.name,
            plant_type: new_plant.plant_type,
            notes: new_plant.notes,
            light: new_plant.light,
            watering_schedule,
            extra: serde_json::Map::new(),
        };
        if let Some(schedule) = &plant.watering_schedule {
            self.reminders.upsert(id, &plant.name, schedule);
        }
        self.plants.push(plant.clone());
        self.persist(&[Collection::Plants, Collection::Reminders])?;

        info!("Added plant {} ({})", plant.id, plant.name);
        Ok(plant)
    }

    /// Start or replace care tracking for a plant.
    pub fn set_schedule(&mut self, plant_id: PlantId, input: ScheduleInput) -> Result<WateringSchedule, EngineError> {
        let index = self.plant_index(plant_id)?;
        let schedule = self.build_schedule(input, self.clock.now())?;

        let plant = &mut self.plants[index];
        plant.watering_schedule = Some(schedule.clone());
        self.reminders.upsert(plant_id, &plant.name, &schedule);
        self.persist(&[Collection::Plants, Collection::Reminders])?;

        info!(
            "Plant {} now watered every {} day(s), next due {}",
            plant_id,
            schedule.frequency_days,
            next_due_date(&schedule)
        );
        Ok(schedule)
    }

    /// Record a watering now. Returns the new due date.
    pub fn mark_watered(&mut self, plant_id: PlantId, notes: &str) -> Result<NaiveDateTime, EngineError> {
        let now = self.clock.now();
        let index = self.plant_index(plant_id)?;
        let plant = &mut self.plants[index];
        let Some(schedule) = plant.watering_schedule.as_mut() else {
            return Err(EngineError::NoSchedule(plant_id));
        };

        schedule.last_watered = now;
        self.history.append(plant_id, HistoryEntry::watered(now, notes));
        let due = self.reminders.upsert(plant_id, &plant.name, schedule).due_date;
        self.persist(&Collection::ALL)?;

        info!("Plant {} watered, next due {}", plant_id, due);
        Ok(due)
    }

    /// Push the next watering back by `days` by moving `last_watered`
    /// forward. Returns the new due date.
    pub fn snooze(&mut self, plant_id: PlantId, days: u32) -> Result<NaiveDateTime, EngineError> {
        let index = self.plant_index(plant_id)?;
        let plant = &mut self.plants[index];
        let Some(schedule) = plant.watering_schedule.as_mut() else {
            return Err(EngineError::NoSchedule(plant_id));
        };

        let Some(snoozed) = schedule::snoozed_last_watered(schedule, days) else {
            return Err(EngineError::InvalidSchedule(format!(
                "cannot snooze {} day(s) past {}",
                days, schedule.last_watered
            )));
        };
        schedule.last_watered = snoozed;
        let due = self.reminders.upsert(plant_id, &plant.name, schedule).due_date;
        self.persist(&[Collection::Plants, Collection::Reminders])?;

        info!("Plant {} snoozed {} day(s), next due {}", plant_id, days, due);
        Ok(due)
    }

    /// Remove a plant together with its reminder and history.
    pub fn delete_plant(&mut self, plant_id: PlantId) -> Result<Plant, EngineError> {
        let index = self.plant_index(plant_id)?;
        let plant = self.plants.remove(index);
        self.reminders.remove(plant_id);
        self.history.purge(plant_id);
        self.persist(&Collection::ALL)?;

        info!("Deleted plant {} ({})", plant_id, plant.name);
        Ok(plant)
    }

    pub fn set_reminder_enabled(&mut self, plant_id: PlantId, enabled: bool) -> Result<(), EngineError> {
        if !self.reminders.set_enabled(plant_id, enabled) {
            return Err(match self.plant(plant_id) {
                Some(_) => EngineError::NoSchedule(plant_id),
                None => EngineError::NotFound(plant_id),
            });
        }
        self.persist(&[Collection::Reminders])?;
        debug!("Reminder for plant {} enabled = {}", plant_id, enabled);
        Ok(())
    }

    /// Append plants from a JSON array. Returns how many were imported.
    pub fn import_data(&mut self, json: &str) -> Result<usize, EngineError> {
        let taken: BTreeSet<PlantId> = self.plants.iter().map(|p| p.id).collect();
        let mut imported = backup::parse_import(json, &taken, self.next_id())?;

        let now = self.clock.now();
        for plant in &mut imported {
            if let Some(schedule) = plant.watering_schedule.as_mut() {
                if schedule.last_watered > now {
                    warn!(
                        "Imported plant {} was last watered in the future ({}), using {}",
                        plant.id, schedule.last_watered, now
                    );
                    schedule.last_watered = now;
                }
                self.reminders.upsert(plant.id, &plant.name, schedule);
            }
        }
        let count = imported.len();
        self.plants.extend(imported);
        self.persist(&[Collection::Plants, Collection::Reminders])?;

        info!("Imported {} plant(s)", count);
        Ok(count)
    }

    // === Queries ===

    pub fn status(&self, plant: &Plant) -> WateringStatus {
        schedule::status(plant.watering_schedule.as_ref(), self.clock.today())
    }

    /// Consistency of a plant's recorded waterings. `Ok(None)` when the plant
    /// has no schedule or fewer than two waterings.
    pub fn stats(&self, plant_id: PlantId) -> Result<Option<ConsistencyStat>, EngineError> {
        let plant = self.plant(plant_id).ok_or(EngineError::NotFound(plant_id))?;
        Ok(plant
            .watering_schedule
            .as_ref()
            .and_then(|schedule| stats::consistency(schedule, self.history.get(plant_id, HISTORY_CAP))))
    }

    pub fn due_reminders(&self) -> Vec<Reminder> {
        self.due_reminders_at(self.clock.now())
    }

    pub fn due_reminders_at(&self, now: NaiveDateTime) -> Vec<Reminder> {
        self.reminders.check_due(now.date()).cloned().collect()
    }

    pub fn summary(&self) -> CollectionSummary {
        stats::collection_summary(&self.plants)
    }

    /// Snapshot of the persisted state, optionally for one plant only.
    pub fn backup(&self, plant_id: Option<PlantId>) -> Result<BackupDocument, EngineError> {
        let export_date = self.clock.now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        let document = match plant_id {
            Some(id) => BackupDocument {
                export_date,
                plants: vec![self.plant(id).ok_or(EngineError::NotFound(id))?.clone()],
                history: self.history.only(id),
                reminders: self.reminders.only(id),
            },
            None => BackupDocument {
                export_date,
                plants: self.plants.clone(),
                history: self.history.clone(),
                reminders: self.reminders.clone(),
            },
        };
        Ok(document)
    }

    /// [`backup`](Self::backup) as pretty-printed JSON.
    pub fn export(&self, plant_id: Option<PlantId>) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(&self.backup(plant_id)?)?)
    }

    // === Accessors ===

    pub fn plants(&self) -> &[Plant] {
        &self.plants
    }

    pub fn plant(&self, plant_id: PlantId) -> Option<&Plant> {
        self.plants.iter().find(|p| p.id == plant_id)
    }

    /// Up to `limit` most recent waterings, newest first.
    pub fn history(&self, plant_id: PlantId, limit: usize) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.history.get(plant_id, limit)
    }

    pub fn reminders(&self) -> impl Iterator<Item = &Reminder> + '_ {
        self.reminders.iter()
    }

    pub fn reminder(&self, plant_id: PlantId) -> Option<&Reminder> {
        self.reminders.get(plant_id)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // === Internals ===

    fn plant_index(&self, plant_id: PlantId) -> Result<usize, EngineError> {
        self.plants
            .iter()
            .position(|p| p.id == plant_id)
            .ok_or(EngineError::NotFound(plant_id))
    }

    fn next_id(&self) -> PlantId {
        self.plants.iter().map(|p| p.id).max().map_or(1, |max| max + 1)
    }

    fn build_schedule(&self, input: ScheduleInput, now: NaiveDateTime) -> Result<WateringSchedule, EngineError> {
        let frequency_days = match input.frequency_days {
            None => self.options.default_frequency_days,
            Some(days) => match u32::try_from(days).ok().and_then(NonZeroU32::new) {
                Some(valid) => valid,
                None if self.options.strict_frequency => {
                    return Err(EngineError::InvalidSchedule(format!(
                        "frequency must be a positive number of days, got {}",
                        days
                    )));
                }
                None => {
                    warn!(
                        "Invalid watering frequency {}, using {} days",
                        days, self.options.default_frequency_days
                    );
                    self.options.default_frequency_days
                }
            },
        };

        let last_watered = match input.last_watered {
            Some(at) if at > now => {
                warn!("Last watered {} is in the future, using {}", at, now);
                now
            }
            Some(at) => at,
            None => now,
        };

        let reminder_time = match input.reminder_time {
            None => self.options.default_reminder_time.clone(),
            Some(raw) => match parse_reminder_time(&raw) {
                Ok(time) => time,
                Err(e) if self.options.strict_frequency => {
                    return Err(EngineError::InvalidSchedule(format!(
                        "reminder time '{}' is not HH:MM: {}",
                        raw, e
                    )));
                }
                Err(_) => {
                    warn!(
                        "Invalid reminder time '{}', using {}",
                        raw, self.options.default_reminder_time
                    );
                    self.options.default_reminder_time.clone()
                }
            },
        };

        Ok(WateringSchedule {
            frequency_days,
            last_watered,
            reminder_time,
            custom_days: input.custom_days.filter(|days| !days.is_empty()),
            notes: input.notes.unwrap_or_default(),
        })
    }

    /// Write the given collections in one batch.
    fn persist(&mut self, collections: &[Collection]) -> Result<(), EngineError> {
        let batch = collections
            .iter()
            .map(|collection| {
                let json = match collection {
                    Collection::Plants => serde_json::to_string(&self.plants)?,
                    Collection::History => serde_json::to_string(&self.history)?,
                    Collection::Reminders => serde_json::to_string(&self.reminders)?,
                };
                Ok((*collection, json))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        self.storage.save_batch(&batch)?;
        Ok(())
    }
}

/// Read one collection, falling back to its empty value on any failure.
/// The flag reports whether the stored value (if any) was usable.
fn load_collection<T, S>(storage: &S, collection: Collection) -> (T, bool)
where
    T: DeserializeOwned + Default,
    S: Storage,
{
    match storage.load(collection) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(value) => (value, true),
            Err(e) => {
                warn!("Stored {} is corrupt, starting empty: {}", collection.key(), e);
                (T::default(), false)
            }
        },
        Ok(None) => (T::default(), true),
        Err(e) => {
            warn!("Could not read {}, starting empty: {}", collection.key(), e);
            (T::default(), false)
        }
    }
}
