use crate::config::toml_config::{SecretBackend, SecretsConfig};
use crate::domain::ports::SecretStore;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::Mutex;

const KEY_VAULT_API_VERSION: &str = "7.4";
const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Box<T> {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        (**self).get(name).await
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        (**self).set(name, value).await
    }
}

/// Process-local store; nothing survives the run.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(name: &str, value: &str) -> Self {
        let mut secrets = HashMap::new();
        secrets.insert(name.to_string(), value.to_string());
        Self {
            secrets: Mutex::new(secrets),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.secrets.lock().await.get(name).cloned())
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object of name → value in a single file.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SyncError::SecretStoreError {
                message: format!("{} is not a JSON object of strings: {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(name))
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut secrets = self.load().await?;
        secrets.insert(name.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a truncated token file.
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&secrets)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AzureTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct KeyVaultSecret {
    value: Option<String>,
}

/// Azure Key Vault over its REST API, authenticated with client credentials.
pub struct KeyVaultSecretStore {
    client: Client,
    vault_url: String,
    authority_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    access_token: Mutex<Option<String>>,
}

impl KeyVaultSecretStore {
    pub fn new(
        client: Client,
        vault_url: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            client,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            access_token: Mutex::new(None),
        }
    }

    pub fn with_authority(mut self, authority_url: &str) -> Self {
        self.authority_url = authority_url.trim_end_matches('/').to_string();
        self
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{}", self.vault_url, name)
    }

    async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token_url = format!("{}/{}/oauth2/v2.0/token", self.authority_url, self.tenant_id);
        let response = self
            .client
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", KEY_VAULT_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SecretStoreError {
                message: format!("Azure AD token request failed ({}): {}", status, body),
            });
        }

        let token: AzureTokenResponse = response.json().await?;
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let bearer = self.bearer_token().await?;
        let response = self
            .client
            .get(self.secret_url(name))
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(bearer)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SecretStoreError {
                message: format!("reading secret '{}' failed ({}): {}", name, status, body),
            });
        }

        let secret: KeyVaultSecret = response.json().await?;
        Ok(secret.value)
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let bearer = self.bearer_token().await?;
        let response = self
            .client
            .put(self.secret_url(name))
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(bearer)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SecretStoreError {
                message: format!("writing secret '{}' failed ({}): {}", name, status, body),
            });
        }
        Ok(())
    }
}

/// Builds the secret store selected in `[secrets]`.
pub fn secret_store_from_config(
    config: &SecretsConfig,
    client: Client,
) -> Result<Box<dyn SecretStore>> {
    match config.backend {
        SecretBackend::Memory => {
            tracing::warn!("⚠️ In-memory secret store: the rotated refresh token will be lost at exit");
            Ok(Box::new(MemorySecretStore::new()))
        }
        SecretBackend::File => Ok(Box::new(FileSecretStore::new(&config.path))),
        SecretBackend::KeyVault => {
            let required = |field: &str, value: &Option<String>| {
                value.clone().ok_or_else(|| SyncError::MissingConfigError {
                    field: format!("secrets.{}", field),
                })
            };
            let store = KeyVaultSecretStore::new(
                client,
                &required("vault_url", &config.vault_url)?,
                &required("tenant_id", &config.tenant_id)?,
                &required("client_id", &config.client_id)?,
                &required("client_secret", &config.client_secret)?,
            );
            Ok(Box::new(match config.authority_url.as_deref() {
                Some(authority) => store.with_authority(authority),
                None => store,
            }))
        }
    }
}
