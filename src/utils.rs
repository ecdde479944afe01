use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "botanica-dev",
            Profile::Prod => "botanica",
        }
    }
}

/// Get the configuration directory path for botanica
/// If profile is Dev, uses "botanica-dev" instead of "botanica"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    // On macOS, this will use ~/Library/Application Support/botanica/
    ProjectDirs::from("com", "botanica", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for botanica
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "botanica", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Parse a wall-clock datetime.
///
/// Accepts a bare date (midnight), `YYYY-MM-DDTHH:MM[:SS[.fff]]`, or a full
/// RFC 3339 timestamp, which is converted to this machine's local time.
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let value = value.trim();
    if let Ok(date) = parse_date(value) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(datetime) = value.parse::<NaiveDateTime>() {
        return Ok(datetime);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Ok(datetime);
    }
    chrono::DateTime::parse_from_rfc3339(value).map(|datetime| datetime.with_timezone(&Local).naive_local())
}

/// Epoch milliseconds of a local wall-clock time. A time skipped by a DST
/// change is read as UTC.
pub fn local_epoch_millis(at: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&at)
        .earliest()
        .map_or_else(|| at.and_utc().timestamp_millis(), |datetime| datetime.timestamp_millis())
}

/// Validate an `HH:MM` reminder time and return it zero-padded.
pub fn parse_reminder_time(value: &str) -> Result<String, chrono::ParseError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map(|time| time.format("%H:%M").to_string())
}

/// Serde adapter for wall-clock datetimes stored as `YYYY-MM-DDTHH:MM:SS.fff`.
///
/// Reading goes through [`parse_datetime`], so exports that carry a UTC `Z`
/// suffix load as well, shifted to local time.
pub mod wall_clock {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_datetime(&raw).map_err(|e| {
            serde::de::Error::custom(format!("invalid datetime '{}': {}", raw, e))
        })
    }
}
