use crate::domain::model::SyncSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

pub struct SyncEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> SyncEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Runs extract, transform and load strictly one after another.
    pub async fn run(&self) -> Result<SyncSummary> {
        tracing::info!("🚀 Starting Bullhorn → Plecto sync");

        let records = self.pipeline.extract().await?;
        let fetched = records.len();
        tracing::info!("📥 Extracted {} records", fetched);

        let registrations = self.pipeline.transform(records).await?;
        let transformed = registrations.len();
        tracing::info!("🔄 Transformed {} registrations", transformed);

        let loaded = self.pipeline.load(registrations).await?;
        tracing::info!(
            "📤 Loaded {} registrations in {} batches",
            loaded.uploaded,
            loaded.batches
        );

        Ok(SyncSummary {
            fetched,
            transformed,
            ..loaded
        })
    }
}
