use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::engine::WateringScheduleEngine;
use crate::error::EngineError;
use crate::models::{NewPlant, Plant, PlantId, ScheduleInput, WateringStatus, Weekday};
use crate::poller::ReminderPoller;
use crate::storage::Storage;
use crate::utils::{parse_datetime, parse_reminder_time};

#[derive(Parser)]
#[command(name = "botanica")]
#[command(about = "Botanica - watering schedules and reminders for your plants")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long, global = true)]
    pub dev: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a plant, optionally with a watering schedule
    Add {
        /// Plant name
        name: String,
        /// Plant type (e.g. fern, succulent)
        #[arg(long = "type")]
        plant_type: String,
        #[arg(long)]
        notes: Option<String>,
        /// Light level (e.g. low, medium, bright)
        #[arg(long)]
        light: Option<String>,
        /// Water every N days
        #[arg(long, allow_negative_numbers = true)]
        every: Option<i64>,
        /// Last watered (YYYY-MM-DD or YYYY-MM-DDTHH:MM)
        #[arg(long)]
        last_watered: Option<String>,
        /// Reminder time (HH:MM)
        #[arg(long)]
        time: Option<String>,
    },
    /// List plants with their watering status (default if no subcommand)
    List {
        #[arg(long)]
        json: bool,
    },
    /// Create or replace a plant's watering schedule
    Schedule {
        plant_id: PlantId,
        /// Water every N days
        #[arg(long, allow_negative_numbers = true)]
        every: Option<i64>,
        /// Last watered (YYYY-MM-DD or YYYY-MM-DDTHH:MM)
        #[arg(long)]
        last_watered: Option<String>,
        /// Reminder time (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Comma-separated weekdays (e.g. mon,thu)
        #[arg(long)]
        days: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a watering now
    Water {
        plant_id: PlantId,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Push the next watering back
    Snooze {
        plant_id: PlantId,
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Show recent waterings, newest first
    History {
        plant_id: PlantId,
        /// Defaults to `history_limit` from the config
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show how closely waterings have followed the schedule
    Stats {
        plant_id: PlantId,
        #[arg(long)]
        json: bool,
    },
    /// List reminders that are due now
    Due {
        #[arg(long)]
        json: bool,
    },
    /// Enable or disable a plant's reminder
    Reminder {
        #[command(subcommand)]
        action: ReminderAction,
    },
    /// Delete a plant with its history and reminder
    Remove { plant_id: PlantId },
    /// Write a JSON backup
    Export {
        /// Only export this plant
        #[arg(long)]
        plant: Option<PlantId>,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import plants from a JSON array
    Import { file: PathBuf },
    /// Collection counters
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Keep running and print due reminders as they come up
    Watch {
        /// Seconds between checks (defaults to `poll_interval_secs`)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum ReminderAction {
    Enable { plant_id: PlantId },
    Disable { plant_id: PlantId },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to parse time: {0}")]
    TimeParseError(String),
    #[error("Failed to parse weekdays: {0}")]
    WeekdayParseError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct PlantRow<'a> {
    #[serde(flatten)]
    plant: &'a Plant,
    status: WateringStatus,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_when(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Parse a user-supplied date or datetime
pub fn parse_when(value: &str) -> Result<NaiveDateTime, CliError> {
    parse_datetime(value)
        .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", value, e)))
}

/// Parse a comma-separated weekday list such as `mon,thu`
pub fn parse_weekdays(value: &str) -> Result<BTreeSet<Weekday>, CliError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<Weekday>().map_err(CliError::WeekdayParseError))
        .collect()
}

fn schedule_input(
    every: Option<i64>,
    last_watered: Option<String>,
    time: Option<String>,
    days: Option<String>,
    notes: Option<String>,
) -> Result<ScheduleInput, CliError> {
    let last_watered = last_watered.as_deref().map(parse_when).transpose()?;
    let reminder_time = time
        .map(|t| parse_reminder_time(&t).map_err(|e| CliError::TimeParseError(format!("'{}': {}", t, e))))
        .transpose()?;
    let custom_days = days.as_deref().map(parse_weekdays).transpose()?;

    Ok(ScheduleInput {
        frequency_days: every,
        last_watered,
        reminder_time,
        custom_days,
        notes,
    })
}

/// Handle the add command
#[allow(clippy::too_many_arguments)]
pub fn handle_add<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    name: String,
    plant_type: String,
    notes: Option<String>,
    light: Option<String>,
    every: Option<i64>,
    last_watered: Option<String>,
    time: Option<String>,
) -> Result<(), CliError> {
    let schedule = if every.is_some() || last_watered.is_some() || time.is_some() {
        Some(schedule_input(every, last_watered, time, None, None)?)
    } else {
        None
    };

    let plant = engine.add_plant(NewPlant {
        name,
        plant_type,
        notes,
        light,
        schedule,
    })?;
    println!("Plant added successfully (ID: {})", plant.id);
    if let Some(reminder) = engine.reminder(plant.id) {
        println!("Next watering: {}", format_when(reminder.due_date));
    }

    Ok(())
}

/// Handle the list command
pub fn handle_list<S: Storage, C: Clock>(engine: &WateringScheduleEngine<S, C>, json: bool) -> Result<(), CliError> {
    if json {
        let rows: Vec<PlantRow<'_>> = engine
            .plants()
            .iter()
            .map(|plant| PlantRow {
                plant,
                status: engine.status(plant),
            })
            .collect();
        return print_json(&rows);
    }

    if engine.plants().is_empty() {
        println!("No plants yet. Add one with `botanica add <name> --type <type>`.");
        return Ok(());
    }
    for plant in engine.plants() {
        let status = engine.status(plant);
        println!("{:>4}  {:<24} {:<14} {}", plant.id, plant.name, plant.plant_type, status.text);
    }

    Ok(())
}

/// Handle the schedule command
pub fn handle_schedule<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    plant_id: PlantId,
    every: Option<i64>,
    last_watered: Option<String>,
    time: Option<String>,
    days: Option<String>,
    notes: Option<String>,
) -> Result<(), CliError> {
    let input = schedule_input(every, last_watered, time, days, notes)?;
    let schedule = engine.set_schedule(plant_id, input)?;
    println!(
        "Schedule set: every {} day(s) at {}, last watered {}",
        schedule.frequency_days,
        schedule.reminder_time,
        format_when(schedule.last_watered)
    );
    if let Some(reminder) = engine.reminder(plant_id) {
        println!("Next watering: {}", format_when(reminder.due_date));
    }

    Ok(())
}

/// Handle the water command
pub fn handle_water<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    plant_id: PlantId,
    notes: &str,
) -> Result<(), CliError> {
    let due = engine.mark_watered(plant_id, notes)?;
    println!("Watered. Next watering: {}", format_when(due));
    Ok(())
}

/// Handle the snooze command
pub fn handle_snooze<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    plant_id: PlantId,
    days: u32,
) -> Result<(), CliError> {
    let due = engine.snooze(plant_id, days)?;
    println!("Snoozed {} day(s). Next watering: {}", days, format_when(due));
    Ok(())
}

/// Handle the history command
pub fn handle_history<S: Storage, C: Clock>(
    engine: &WateringScheduleEngine<S, C>,
    plant_id: PlantId,
    limit: usize,
    json: bool,
) -> Result<(), CliError> {
    if engine.plant(plant_id).is_none() {
        return Err(EngineError::NotFound(plant_id).into());
    }
    let entries: Vec<_> = engine.history(plant_id, limit).collect();
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No waterings recorded");
    }
    for entry in entries {
        if entry.notes.is_empty() {
            println!("{}", format_when(entry.date));
        } else {
            println!("{}  {}", format_when(entry.date), entry.notes);
        }
    }

    Ok(())
}

/// Handle the stats command
pub fn handle_stats<S: Storage, C: Clock>(
    engine: &WateringScheduleEngine<S, C>,
    plant_id: PlantId,
    json: bool,
) -> Result<(), CliError> {
    let stat = engine.stats(plant_id)?;
    if json {
        return print_json(&stat);
    }

    match stat {
        Some(stat) => {
            println!("Waterings:      {}", stat.total_waterings);
            println!("Avg interval:   {} day(s)", stat.average_interval_days);
            println!("Scheduled:      every {} day(s)", stat.scheduled_interval_days);
            println!("Consistency:    {}%", stat.consistency_percent);
            println!("Last watered:   {}", format_when(stat.last_watered));
            println!("Next watering:  {}", format_when(stat.next_watering));
        }
        None => println!("Not enough watering history yet"),
    }

    Ok(())
}

/// Handle the due command
pub fn handle_due<S: Storage, C: Clock>(engine: &WateringScheduleEngine<S, C>, json: bool) -> Result<(), CliError> {
    let due = engine.due_reminders();
    if json {
        return print_json(&due);
    }

    if due.is_empty() {
        println!("Nothing needs water right now");
    }
    for reminder in due {
        println!(
            "{:>4}  {:<24} due {} ({})",
            reminder.plant_id,
            reminder.plant_name,
            format_when(reminder.due_date),
            reminder.time
        );
    }

    Ok(())
}

/// Handle the reminder enable/disable commands
pub fn handle_reminder<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    action: ReminderAction,
) -> Result<(), CliError> {
    let (plant_id, enabled) = match action {
        ReminderAction::Enable { plant_id } => (plant_id, true),
        ReminderAction::Disable { plant_id } => (plant_id, false),
    };
    engine.set_reminder_enabled(plant_id, enabled)?;
    println!(
        "Reminder {} for plant {}",
        if enabled { "enabled" } else { "disabled" },
        plant_id
    );
    Ok(())
}

/// Handle the remove command
pub fn handle_remove<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    plant_id: PlantId,
) -> Result<(), CliError> {
    let plant = engine.delete_plant(plant_id)?;
    println!("Removed {} (ID: {})", plant.name, plant.id);
    Ok(())
}

/// Handle the export command
pub fn handle_export<S: Storage, C: Clock>(
    engine: &WateringScheduleEngine<S, C>,
    plant: Option<PlantId>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let json = engine.export(plant)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("Backup written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Handle the import command
pub fn handle_import<S: Storage, C: Clock>(
    engine: &mut WateringScheduleEngine<S, C>,
    file: PathBuf,
) -> Result<(), CliError> {
    let json = std::fs::read_to_string(&file)?;
    let count = engine.import_data(&json)?;
    println!("Imported {} plant(s) from {}", count, file.display());
    Ok(())
}

/// Handle the summary command
pub fn handle_summary<S: Storage, C: Clock>(engine: &WateringScheduleEngine<S, C>, json: bool) -> Result<(), CliError> {
    let summary = engine.summary();
    if json {
        return print_json(&summary);
    }

    println!("Plants:       {}", summary.total);
    println!("Needs water:  {}", summary.needs_water);
    println!("Low light:    {}", summary.low_light);
    Ok(())
}

/// Handle the watch command: poll until Ctrl-C
pub async fn handle_watch<S, C>(engine: WateringScheduleEngine<S, C>, every: Duration) -> Result<(), CliError>
where
    S: Storage + Send + 'static,
    C: Clock + 'static,
{
    let engine = Arc::new(Mutex::new(engine));
    let mut poller = ReminderPoller::new();
    let mut batches = poller.start(Arc::clone(&engine), every);
    println!("Watching for due reminders every {}s (Ctrl-C to stop)", every.as_secs());

    let mut shown: BTreeSet<(PlantId, NaiveDateTime)> = BTreeSet::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            batch = batches.recv() => {
                let Some(batch) = batch else { break };
                for reminder in batch.reminders {
                    // Only announce each due date once per run.
                    if shown.insert((reminder.plant_id, reminder.due_date)) {
                        println!(
                            "[{}] Time to water {} (due {})",
                            format_when(batch.checked_at),
                            reminder.plant_name,
                            format_when(reminder.due_date)
                        );
                    }
                }
            }
        }
    }

    poller.stop();
    Ok(())
}
