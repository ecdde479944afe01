//! JSON export documents and plant import.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::history::WateringHistoryLog;
use crate::models::{Plant, PlantId};
use crate::reminders::ReminderRegistry;

/// Everything the engine persists, as written by `export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub export_date: String,
    pub plants: Vec<Plant>,
    pub history: WateringHistoryLog,
    pub reminders: ReminderRegistry,
}

/// Parse an import payload into plants ready to append.
///
/// The payload must be a JSON array. Elements missing a non-empty `name` or
/// `type`, or that don't otherwise read as a plant, are skipped. Records with
/// no usable id, or with an id in `taken`, are given fresh ids counting up
/// from `next_id`.
pub fn parse_import(
    json: &str,
    taken: &BTreeSet<PlantId>,
    mut next_id: PlantId,
) -> Result<Vec<Plant>, EngineError> {
    let payload: Value = serde_json::from_str(json)
        .map_err(|e| EngineError::MalformedImport(format!("Error parsing JSON: {}", e)))?;
    let Value::Array(records) = payload else {
        return Err(EngineError::MalformedImport("Invalid data format: expected an array of plants".to_string()));
    };

    let mut taken = taken.clone();
    let mut plants = Vec::new();
    for (position, record) in records.into_iter().enumerate() {
        let Value::Object(mut fields) = record else {
            debug!("Skipping import record {}: not an object", position);
            continue;
        };
        if !has_text(&fields, "name") || !has_text(&fields, "type") {
            debug!("Skipping import record {}: missing name or type", position);
            continue;
        }

        let needs_id = fields
            .get("id")
            .and_then(Value::as_i64)
            .is_none_or(|id| taken.contains(&id));
        if needs_id {
            fields.insert("id".to_string(), Value::from(next_id));
        }

        match serde_json::from_value::<Plant>(Value::Object(fields)) {
            Ok(plant) => {
                taken.insert(plant.id);
                next_id = next_id.max(plant.id.saturating_add(1));
                plants.push(plant);
            }
            Err(e) => debug!("Skipping import record {}: {}", position, e),
        }
    }

    Ok(plants)
}

fn has_text(fields: &serde_json::Map<String, Value>, key: &str) -> bool {
    fields
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|value| !value.is_empty())
}
