use crate::domain::model::Registration;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, SyncError};
use std::collections::BTreeSet;

pub const JSON_SNAPSHOT: &str = "registrations.json";
pub const CSV_SNAPSHOT: &str = "registrations.csv";

const BASE_COLUMNS: [&str; 6] = [
    "data_source",
    "member_api_provider",
    "member_api_id",
    "member_name",
    "external_id",
    "date_added",
];

/// Writes the registrations of the current run for inspection. Overwritten on every run.
pub async fn write_snapshot<S: Storage>(storage: &S, registrations: &[Registration]) -> Result<()> {
    let json = serde_json::to_vec_pretty(registrations)?;
    storage.write_file(JSON_SNAPSHOT, &json).await?;

    let csv = registrations_to_csv(registrations)?;
    storage.write_file(CSV_SNAPSHOT, &csv).await?;

    tracing::debug!("🗂️ Snapshot of {} registrations written", registrations.len());
    Ok(())
}

fn registrations_to_csv(registrations: &[Registration]) -> Result<Vec<u8>> {
    let extra_columns: BTreeSet<&str> = registrations
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(BASE_COLUMNS.iter().copied().chain(extra_columns.iter().copied()))?;

    for registration in registrations {
        let mut row = vec![
            registration.data_source.clone(),
            registration.member_api_provider.clone(),
            registration.member_api_id.clone(),
            registration.member_name.clone(),
            registration.external_id.clone(),
            registration.date_added.clone().unwrap_or_default(),
        ];
        for column in &extra_columns {
            row.push(match registration.fields.get(*column) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            });
        }
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|e| SyncError::IoError(e.into_error()))
}
