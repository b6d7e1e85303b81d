use crate::config::toml_config::PlectoConfig;
use crate::domain::model::EntityKind;
use crate::utils::error::{Result, SyncError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct FieldDefinition<'a> {
    name: &'a str,
    input: &'a str,
    default_value: &'a str,
}

#[derive(Debug, Serialize)]
struct DataSourceRequest<'a> {
    title: &'a str,
    fields: Vec<FieldDefinition<'a>>,
}

#[derive(Debug, Deserialize)]
struct DataSourceResponse {
    id: Option<String>,
}

/// Basic-auth client for the Plecto v2 API.
#[derive(Debug, Clone)]
pub struct PlectoClient {
    client: Client,
    base_url: String,
    email: String,
    password: String,
}

impl PlectoClient {
    pub fn new(client: Client, config: &PlectoConfig) -> Self {
        Self {
            client,
            base_url: config.base_url().to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
        }
    }

    /// POSTs a registration (object) or a batch of registrations (array).
    /// Returns the response status; anything outside 2xx is an `UploadError`.
    pub async fn post_registrations<T: Serialize + ?Sized>(
        &self,
        batch: usize,
        body: &T,
    ) -> Result<u16> {
        let url = format!("{}/api/v2/registrations/", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.password))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::UploadError {
                batch,
                status: status.as_u16(),
                body,
            });
        }
        Ok(status.as_u16())
    }

    /// Creates a data source declaring the custom fields of `entity`; returns its id.
    pub async fn create_data_source(&self, title: &str, entity: EntityKind) -> Result<String> {
        let url = format!("{}/api/v2/datasources/", self.base_url);
        let request = DataSourceRequest {
            title,
            fields: entity
                .sink_fields()
                .iter()
                .map(|&name| FieldDefinition {
                    name,
                    input: "TextInput",
                    default_value: "",
                })
                .collect(),
        };

        tracing::info!("📤 Creating Plecto data source '{}'", title);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::DataSourceError {
                status: status.as_u16(),
                body,
            });
        }

        let created: DataSourceResponse = response.json().await?;
        let id = created.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            SyncError::DataSourceError {
                status: status.as_u16(),
                body: "response carried no id".to_string(),
            }
        })?;
        tracing::info!("✅ Data source created: {}", id);
        Ok(id)
    }
}
