use crate::config::toml_config::FetchConfig;
use crate::domain::model::{DomainRecord, EntityKind, Session};
use crate::utils::error::{Result, SyncError};
use crate::utils::time::TimeWindow;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// What to do when a page request fails halfway through a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFailurePolicy {
    /// Log the failure and continue the run with the records fetched so far.
    #[default]
    BestEffort,
    FailFast,
}

#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub entity: EntityKind,
    pub where_clause: String,
    pub page_size: usize,
    pub action_filter: Option<String>,
    pub max_pages: Option<usize>,
    pub on_page_error: PageFailurePolicy,
}

impl RecordQuery {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            where_clause: "id>0".to_string(),
            page_size: 100,
            action_filter: None,
            max_pages: None,
            on_page_error: PageFailurePolicy::default(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        let mut query = Self::new(config.entity);
        if let Some(where_clause) = config.where_clause.as_deref().filter(|w| !w.trim().is_empty()) {
            query.where_clause = where_clause.to_string();
        }
        query.page_size = config.page_size.max(1);
        query.action_filter = config.action_filter.clone();
        query.max_pages = config.max_pages;
        query.on_page_error = config.on_page_error;
        query
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_action_filter(mut self, action: impl Into<String>) -> Self {
        self.action_filter = Some(action.into());
        self
    }

    pub fn with_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.on_page_error = policy;
        self
    }
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

pub struct RecordFetcher {
    client: Client,
}

impl RecordFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Pages through `query/{Entity}` until an empty page, a failed page,
    /// or (with a window) the first record older than the window.
    ///
    /// With a window the query is sorted by `-dateAdded`, so everything after
    /// the first out-of-window record is older still and never requested.
    pub async fn fetch(
        &self,
        session: &Session,
        query: &RecordQuery,
        window: Option<TimeWindow>,
    ) -> Result<Vec<DomainRecord>> {
        let endpoint = format!("{}query/{}", session.rest_url, query.entity.entity_name());
        let mut records = Vec::new();
        let mut start = 0usize;
        let mut pages = 0usize;

        'pages: loop {
            if let Some(max_pages) = query.max_pages {
                if pages >= max_pages {
                    tracing::warn!(
                        "⚠️ Stopping {} scan after {} pages (fetch.max_pages)",
                        query.entity,
                        pages
                    );
                    break;
                }
            }

            let data = match self.fetch_page(session, &endpoint, query, start, window).await {
                Ok(data) => data,
                Err(e) => match query.on_page_error {
                    PageFailurePolicy::FailFast => return Err(e),
                    PageFailurePolicy::BestEffort => {
                        tracing::error!(
                            "❌ {} page at offset {} failed, continuing with {} records: {}",
                            query.entity,
                            start,
                            records.len(),
                            e
                        );
                        break;
                    }
                },
            };
            pages += 1;

            if data.is_empty() {
                tracing::debug!("📭 Empty page at offset {}, pagination exhausted", start);
                break;
            }
            tracing::debug!("📄 Page at offset {}: {} records", start, data.len());

            for raw in data {
                let record: DomainRecord = match serde_json::from_value(raw) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("⚠️ Skipping undecodable {} record: {}", query.entity, e);
                        continue;
                    }
                };

                if let Some(window) = window {
                    match record.date_added {
                        Some(added) if !window.contains(added) => {
                            tracing::info!(
                                "⏱️ {} {} predates the window, stopping scan",
                                query.entity,
                                record.id
                            );
                            break 'pages;
                        }
                        Some(_) => {}
                        None => {
                            tracing::debug!("Skipping {} {} without dateAdded", query.entity, record.id);
                            continue;
                        }
                    }
                }

                if let Some(action) = &query.action_filter {
                    if record.action.as_deref() != Some(action.as_str()) {
                        continue;
                    }
                }

                records.push(record);
            }

            start += query.page_size;
        }

        tracing::info!(
            "📅 Fetched {} {} records in {} pages",
            records.len(),
            query.entity,
            pages
        );
        Ok(records)
    }

    async fn fetch_page(
        &self,
        session: &Session,
        endpoint: &str,
        query: &RecordQuery,
        start: usize,
        window: Option<TimeWindow>,
    ) -> Result<Vec<serde_json::Value>> {
        let start_param = start.to_string();
        let count_param = query.page_size.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("BhRestToken", session.rest_token.as_str()),
            ("fields", query.entity.query_fields()),
            ("where", query.where_clause.as_str()),
            ("start", start_param.as_str()),
            ("count", count_param.as_str()),
        ];
        if window.is_some() {
            params.push(("orderBy", "-dateAdded"));
        }

        let response = self
            .client
            .get(endpoint)
            .query(&params)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::FetchError {
                entity: query.entity.to_string(),
                start,
                status: status.as_u16(),
                body,
            });
        }

        let page: QueryPage = response.json().await?;
        Ok(page.data)
    }
}
