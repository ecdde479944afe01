use std::time::Duration;

use botanica::{
    Config, Database, Profile, SystemClock, WateringScheduleEngine,
    cli::{self, Cli, Commands},
};
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path, profile)?,
        None => Config::load_with_profile(profile)?,
    };

    let db = Database::new(config.get_database_path())?;
    let mut engine = WateringScheduleEngine::open(db, SystemClock, config.engine_options())?;

    // Dispatch to appropriate command handler
    match cli.command.unwrap_or(Commands::List { json: false }) {
        Commands::Add {
            name,
            plant_type,
            notes,
            light,
            every,
            last_watered,
            time,
        } => {
            cli::handle_add(&mut engine, name, plant_type, notes, light, every, last_watered, time)?;
        }
        Commands::List { json } => cli::handle_list(&engine, json)?,
        Commands::Schedule {
            plant_id,
            every,
            last_watered,
            time,
            days,
            notes,
        } => {
            cli::handle_schedule(&mut engine, plant_id, every, last_watered, time, days, notes)?;
        }
        Commands::Water { plant_id, notes } => cli::handle_water(&mut engine, plant_id, &notes)?,
        Commands::Snooze { plant_id, days } => cli::handle_snooze(&mut engine, plant_id, days)?,
        Commands::History { plant_id, limit, json } => {
            cli::handle_history(&engine, plant_id, limit.unwrap_or(config.history_limit), json)?;
        }
        Commands::Stats { plant_id, json } => cli::handle_stats(&engine, plant_id, json)?,
        Commands::Due { json } => cli::handle_due(&engine, json)?,
        Commands::Reminder { action } => cli::handle_reminder(&mut engine, action)?,
        Commands::Remove { plant_id } => cli::handle_remove(&mut engine, plant_id)?,
        Commands::Export { plant, output } => cli::handle_export(&engine, plant, output)?,
        Commands::Import { file } => cli::handle_import(&mut engine, file)?,
        Commands::Summary { json } => cli::handle_summary(&engine, json)?,
        Commands::Watch { interval } => {
            let every = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.poll_interval());
            cli::handle_watch(engine, every).await?;
        }
    }

    Ok(())
}
