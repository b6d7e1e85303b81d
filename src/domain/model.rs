use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// OAuth2 client credentials plus the rotating refresh token.
#[derive(Debug, Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Bullhorn REST session. `rest_url` always ends with exactly one `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub rest_token: String,
    pub rest_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// One appointment or note as returned by the Bullhorn query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub id: i64,
    #[serde(default, alias = "commentingPerson")]
    pub owner: Option<PersonRef>,
    #[serde(default)]
    pub date_added: Option<i64>,
    #[serde(default)]
    pub date_begin: Option<i64>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Appointment,
    Note,
}

impl EntityKind {
    pub fn entity_name(&self) -> &'static str {
        match self {
            EntityKind::Appointment => "Appointment",
            EntityKind::Note => "Note",
        }
    }

    pub fn query_fields(&self) -> &'static str {
        match self {
            EntityKind::Appointment => "id,owner,dateAdded,dateBegin",
            EntityKind::Note => "id,commentingPerson,dateAdded,action",
        }
    }

    /// Custom fields the Plecto data source must declare for this entity.
    pub fn sink_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Appointment => &["appointment_id", "date_added", "date_begin"],
            EntityKind::Note => &["note_id", "date_added", "action"],
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            EntityKind::Appointment => "Bullhorn Appointments",
            EntityKind::Note => "Bullhorn Meeting Notes",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "appointment" | "appointments" => Ok(EntityKind::Appointment),
            "note" | "notes" => Ok(EntityKind::Note),
            other => Err(format!("unknown entity '{}', expected appointment or note", other)),
        }
    }
}

/// One row for the Plecto registrations API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub data_source: String,
    pub member_api_provider: String,
    pub member_api_id: String,
    pub member_name: String,
    pub external_id: String,
    pub date_added: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchResult {
    pub index: usize,
    pub size: usize,
    pub status: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub batches: Vec<BatchResult>,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.batches.iter().map(|b| b.size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub fetched: usize,
    pub transformed: usize,
    pub batches: usize,
    pub uploaded: usize,
}
