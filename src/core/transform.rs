use crate::domain::model::{DomainRecord, EntityKind, Registration};
use crate::utils::time::epoch_millis_to_iso;
use serde_json::Value;
use std::collections::BTreeMap;

/// Maps Bullhorn records onto the registration schema of one Plecto data source.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    data_source_id: String,
    provider: String,
    entity: EntityKind,
}

impl RecordTransformer {
    pub fn new(data_source_id: impl Into<String>, entity: EntityKind) -> Self {
        Self {
            data_source_id: data_source_id.into(),
            provider: "Bullhorn".to_string(),
            entity,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn transform(&self, record: &DomainRecord) -> Registration {
        let owner = record.owner.clone().unwrap_or_default();
        let member_name = format!(
            "{} {}",
            owner.first_name.as_deref().unwrap_or(""),
            owner.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
        let external_id = record.id.to_string();

        let mut fields = BTreeMap::new();
        match self.entity {
            EntityKind::Appointment => {
                fields.insert("appointment_id".to_string(), Value::String(external_id.clone()));
                fields.insert("date_begin".to_string(), optional(epoch_millis_to_iso(record.date_begin)));
            }
            EntityKind::Note => {
                fields.insert("note_id".to_string(), Value::String(external_id.clone()));
                fields.insert("action".to_string(), optional(record.action.clone()));
            }
        }

        Registration {
            data_source: self.data_source_id.clone(),
            member_api_provider: self.provider.clone(),
            member_api_id: owner.id.map(|id| id.to_string()).unwrap_or_default(),
            member_name,
            external_id,
            date_added: epoch_millis_to_iso(record.date_added),
            fields,
        }
    }

    pub fn transform_all(&self, records: &[DomainRecord]) -> Vec<Registration> {
        records.iter().map(|r| self.transform(r)).collect()
    }
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
