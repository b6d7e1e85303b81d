use crate::domain::model::{DomainRecord, Registration, SyncSummary};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Key-value store holding the rotating refresh token between runs.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>>;
    async fn set(&self, name: &str, value: &str) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<DomainRecord>>;
    async fn transform(&self, records: Vec<DomainRecord>) -> Result<Vec<Registration>>;
    async fn load(&self, registrations: Vec<Registration>) -> Result<SyncSummary>;
}
