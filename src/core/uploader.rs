use crate::config::toml_config::PlectoConfig;
use crate::core::plecto::PlectoClient;
use crate::domain::model::{BatchResult, Registration, UploadReport};
use crate::utils::error::Result;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// JSON arrays of at most `batch_size` registrations per request.
    Bulk { batch_size: usize },
    /// One JSON object per request.
    PerRecord,
}

impl Default for UploadMode {
    fn default() -> Self {
        UploadMode::Bulk { batch_size: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

pub struct BatchUploader {
    plecto: PlectoClient,
    mode: UploadMode,
    retry: RetryPolicy,
}

impl BatchUploader {
    pub fn new(plecto: PlectoClient, mode: UploadMode) -> Self {
        let mode = match mode {
            UploadMode::Bulk { batch_size } => UploadMode::Bulk {
                batch_size: batch_size.max(1),
            },
            other => other,
        };
        Self {
            plecto,
            mode,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(plecto: PlectoClient, config: &PlectoConfig) -> Self {
        let mode = if config.per_record {
            UploadMode::PerRecord
        } else {
            UploadMode::Bulk {
                batch_size: config.batch_size,
            }
        };
        Self::new(plecto, mode).with_retry(RetryPolicy {
            attempts: config.retry_attempts,
            delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends every registration, in order. The first batch that fails (after
    /// any configured retries) aborts the upload; later batches are not sent.
    pub async fn upload(&self, registrations: &[Registration]) -> Result<UploadReport> {
        let mut report = UploadReport::default();

        match self.mode {
            UploadMode::Bulk { batch_size } => {
                let total = registrations.len().div_ceil(batch_size);
                for (index, chunk) in registrations.chunks(batch_size).enumerate() {
                    tracing::debug!("📤 Sending batch {}/{} ({} registrations)", index + 1, total, chunk.len());
                    let status = self.send_with_retry(index, chunk).await?;
                    if status != 201 {
                        tracing::debug!("Batch {} accepted with status {}", index, status);
                    }
                    report.batches.push(BatchResult {
                        index,
                        size: chunk.len(),
                        status,
                    });
                }
            }
            UploadMode::PerRecord => {
                for (index, registration) in registrations.iter().enumerate() {
                    let status = self.send_with_retry(index, registration).await?;
                    tracing::debug!("🚀 Registration {} sent ({})", registration.external_id, status);
                    report.batches.push(BatchResult {
                        index,
                        size: 1,
                        status,
                    });
                }
            }
        }

        tracing::info!(
            "✅ Uploaded {} registrations in {} requests",
            report.uploaded(),
            report.batches.len()
        );
        Ok(report)
    }

    async fn send_with_retry<T: Serialize + ?Sized>(&self, index: usize, body: &T) -> Result<u16> {
        let mut attempt = 0;
        loop {
            match self.plecto.post_registrations(index, body).await {
                Ok(status) => return Ok(status),
                Err(e) if attempt < self.retry.attempts && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        "⚠️ Batch {} failed ({}), retry {}/{}",
                        index,
                        e,
                        attempt,
                        self.retry.attempts
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    tracing::error!("❌ Batch {} failed: {}", index, e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::SyncError;
    use httpmock::prelude::*;
    use std::collections::BTreeMap;

    fn plecto(server: &MockServer) -> PlectoClient {
        let config = PlectoConfig {
            base_url: server.base_url(),
            email: "sync@example.com".to_string(),
            password: "pw".to_string(),
            data_source_id: None,
            data_source_title: None,
            member_api_provider: "Bullhorn".to_string(),
            batch_size: 100,
            per_record: false,
            retry_attempts: 0,
            retry_delay_ms: 0,
        };
        PlectoClient::new(reqwest::Client::new(), &config)
    }

    fn registrations(n: usize) -> Vec<Registration> {
        (0..n)
            .map(|i| Registration {
                data_source: "ds".to_string(),
                member_api_provider: "Bullhorn".to_string(),
                member_api_id: "7".to_string(),
                member_name: "A B".to_string(),
                external_id: i.to_string(),
                date_added: None,
                fields: BTreeMap::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bulk_upload_flushes_trailing_chunk() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/registrations/");
            then.status(201).json_body(serde_json::json!([]));
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::Bulk { batch_size: 100 });
        let report = uploader.upload(&registrations(250)).await.unwrap();

        upload_mock.assert_hits(3);
        let sizes: Vec<_> = report.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(report.uploaded(), 250);
    }

    #[tokio::test]
    async fn test_bulk_batches_cover_input_in_order() {
        let server = MockServer::start();
        let input = registrations(23);
        // Each mock only matches its exact slice of the input; any other body gets a 404.

        let chunk_mocks: Vec<_> = input
            .chunks(10)
            .map(|chunk| {
                let expected = serde_json::to_value(chunk).unwrap();
                server.mock(|when, then| {
                    when.method(POST)
                        .path("/api/v2/registrations/")
                        .json_body(expected);
                    then.status(201);
                })
            })
            .collect();

        let uploader = BatchUploader::new(plecto(&server), UploadMode::Bulk { batch_size: 10 });
        let report = uploader.upload(&input).await.unwrap();

        for mock in &chunk_mocks {
            mock.assert_hits(1);
        }
        let indices: Vec<_> = report.batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let sizes: Vec<_> = report.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn test_bulk_upload_exact_multiple() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/registrations/");
            then.status(201);
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::Bulk { batch_size: 50 });
        let report = uploader.upload(&registrations(100)).await.unwrap();

        upload_mock.assert_hits(2);
        assert_eq!(report.batches.last().unwrap().size, 50);
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/registrations/");
            then.status(201);
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::default());
        let report = uploader.upload(&[]).await.unwrap();

        upload_mock.assert_hits(0);
        assert!(report.batches.is_empty());
    }

    #[tokio::test]
    async fn test_per_record_mode_posts_objects() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/registrations/")
                .body_contains("\"external_id\":\"1\"");
            then.status(201);
        });
        let other_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/registrations/")
                .body_contains("\"external_id\":\"0\"");
            then.status(201);
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::PerRecord);
        let report = uploader.upload(&registrations(2)).await.unwrap();

        upload_mock.assert_hits(1);
        other_mock.assert_hits(1);
        assert_eq!(report.batches.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_aborts_upload() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/registrations/");
            then.status(400).body("{\"data_source\":[\"unknown\"]}");
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::Bulk { batch_size: 10 });
        let result = uploader.upload(&registrations(30)).await;

        upload_mock.assert_hits(1);
        assert!(matches!(
            result,
            Err(SyncError::UploadError { batch: 0, status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_retry_policy_retries_server_errors() {
        let server = MockServer::start();
        let upload_mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/registrations/");
            then.status(503);
        });

        let uploader = BatchUploader::new(plecto(&server), UploadMode::default()).with_retry(
            RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(1),
            },
        );
        let result = uploader.upload(&registrations(5)).await;

        upload_mock.assert_hits(3);
        assert!(result.is_err());
    }
}
