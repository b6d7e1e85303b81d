use crate::config::toml_config::SyncConfig;
use crate::core::fetcher::{RecordFetcher, RecordQuery};
use crate::core::plecto::PlectoClient;
use crate::core::session::SessionResolver;
use crate::core::snapshot::write_snapshot;
use crate::core::token::TokenManager;
use crate::core::transform::RecordTransformer;
use crate::core::uploader::BatchUploader;
use crate::domain::model::{DomainRecord, Registration, SyncSummary};
use crate::domain::ports::{Pipeline, SecretStore, Storage};
use crate::utils::error::Result;
use crate::utils::time::TimeWindow;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

/// Bullhorn → Plecto pipeline: refresh, login and fetch in `extract`,
/// mapping in `transform`, snapshot and upload in `load`.
pub struct SyncPipeline<K: SecretStore, S: Storage> {
    config: SyncConfig,
    secrets: K,
    snapshots: Option<S>,
    tokens: TokenManager,
    sessions: SessionResolver,
    fetcher: RecordFetcher,
    plecto: PlectoClient,
    uploader: BatchUploader,
    data_source_id: OnceCell<String>,
    now: DateTime<Utc>,
}

impl<K: SecretStore, S: Storage> SyncPipeline<K, S> {
    pub fn new(config: SyncConfig, secrets: K, snapshots: Option<S>) -> Result<Self> {
        let client = config.http_client()?;
        let plecto = PlectoClient::new(client.clone(), &config.plecto);

        Ok(Self {
            tokens: TokenManager::new(client.clone(), config.bullhorn.clone()),
            sessions: SessionResolver::new(client.clone(), config.bullhorn.login_base_url()),
            fetcher: RecordFetcher::new(client),
            uploader: BatchUploader::from_config(plecto.clone(), &config.plecto),
            plecto,
            data_source_id: OnceCell::new(),
            now: Utc::now(),
            config,
            secrets,
            snapshots,
        })
    }

    /// Pins the reference time used for the lookback window.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn window(&self) -> Result<Option<TimeWindow>> {
        self.config
            .fetch
            .lookback_hours
            .map(|hours| TimeWindow::last_hours(hours, self.now))
            .transpose()
    }

    /// Configured data source id, or a freshly created one when none is configured.
    async fn data_source_id(&self) -> Result<&str> {
        let id = self
            .data_source_id
            .get_or_try_init(|| async {
                if let Some(id) = self.config.plecto.data_source_id() {
                    return Ok(id.to_string());
                }
                let entity = self.config.fetch.entity;
                let title = self
                    .config
                    .plecto
                    .data_source_title
                    .clone()
                    .unwrap_or_else(|| entity.default_title().to_string());
                tracing::warn!("⚠️ No plecto.data_source_id configured, creating '{}'", title);
                self.plecto.create_data_source(&title, entity).await
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait::async_trait]
impl<K: SecretStore, S: Storage> Pipeline for SyncPipeline<K, S> {
    async fn extract(&self) -> Result<Vec<DomainRecord>> {
        let window = self.window()?;
        let grant = self.tokens.obtain(&self.secrets).await?;
        let session = self.sessions.resolve(&grant.access_token).await?;

        let query = RecordQuery::from_config(&self.config.fetch);
        if let Some(window) = window {
            tracing::info!(
                "⏱️ Fetching {} records added since {}",
                query.entity,
                DateTime::<Utc>::from_timestamp_millis(window.lower_bound_millis())
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            );
        }
        self.fetcher.fetch(&session, &query, window).await
    }

    async fn transform(&self, records: Vec<DomainRecord>) -> Result<Vec<Registration>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let data_source_id = self.data_source_id().await?;
        let transformer = RecordTransformer::new(data_source_id, self.config.fetch.entity)
            .with_provider(&self.config.plecto.member_api_provider);
        Ok(transformer.transform_all(&records))
    }

    async fn load(&self, registrations: Vec<Registration>) -> Result<SyncSummary> {
        if let Some(storage) = &self.snapshots {
            write_snapshot(storage, &registrations).await?;
        }

        if registrations.is_empty() {
            tracing::info!("ℹ️ No registrations to upload");
            return Ok(SyncSummary::default());
        }

        let report = self.uploader.upload(&registrations).await?;
        Ok(SyncSummary {
            batches: report.batches.len(),
            uploaded: report.uploaded(),
            ..SyncSummary::default()
        })
    }
}
