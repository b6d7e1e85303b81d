use crate::config::toml_config::BullhornConfig;
use crate::domain::model::{Credential, TokenGrant};
use crate::domain::ports::SecretStore;
use crate::utils::error::{Result, SyncError};
use crate::utils::logger::mask_secret;
use reqwest::{Client, StatusCode};

/// Owns the OAuth2 refresh-token lifecycle against the Bullhorn auth server.
pub struct TokenManager {
    client: Client,
    config: BullhornConfig,
}

impl TokenManager {
    pub fn new(client: Client, config: BullhornConfig) -> Self {
        Self { client, config }
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.config.auth_base_url())
    }

    /// Exchanges `credential.refresh_token` for a fresh access/refresh pair.
    ///
    /// The submitted refresh token is consumed by Bullhorn; the caller must
    /// persist the returned one before doing anything else.
    pub async fn refresh(&self, credential: &Credential) -> Result<TokenGrant> {
        tracing::debug!(
            "🔄 Refreshing access token at {} (refresh token {})",
            self.token_url(),
            mask_secret(&credential.refresh_token)
        );

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credential.refresh_token.as_str()),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("redirect_uri", credential.redirect_uri.as_str()),
        ];
        let grant = self.request_grant(&form).await?;

        if grant.refresh_token == credential.refresh_token {
            tracing::warn!("⚠️ Bullhorn returned the same refresh token; rotation was expected");
        }
        tracing::info!(
            "✅ Access token issued (expires_in: {})",
            grant
                .expires_in
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(grant)
    }

    /// Bootstraps the first refresh token from a manually obtained authorization code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let code = decode_authorization_code(code);
        tracing::info!("🔑 Exchanging authorization code {}", mask_secret(&code));

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.request_grant(&form).await
    }

    async fn request_grant(&self, form: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self.client.post(self.token_url()).form(form).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<TokenGrant>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!("Token endpoint answered {}: {}", status, body);
        if status == StatusCode::BAD_REQUEST && body.contains("invalid_grant") {
            Err(SyncError::InvalidGrant { body })
        } else {
            Err(SyncError::AuthenticationError {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Picks the refresh token to start from: secret store, then the
    /// configured initial token, then the configured fallback token.
    async fn starting_refresh_token<K: SecretStore + ?Sized>(&self, store: &K) -> Result<String> {
        let secret_name = &self.config.refresh_token_secret;
        match store.get(secret_name).await {
            Ok(Some(token)) if !token.trim().is_empty() => {
                tracing::info!("🔑 Refresh token loaded from secret store");
                return Ok(token.trim().to_string());
            }
            Ok(_) => tracing::warn!("⚠️ No stored refresh token under '{}'", secret_name),
            Err(e) => tracing::warn!("⚠️ Could not read refresh token from secret store: {}", e),
        }

        if let Some(token) = self.config.initial_refresh_token() {
            tracing::info!("🔑 Using configured initial refresh token");
            return Ok(token.to_string());
        }
        if let Some(token) = self.config.fallback_refresh_token() {
            tracing::warn!("⚠️ Using configured fallback refresh token");
            return Ok(token.to_string());
        }

        Err(SyncError::MissingConfigError {
            field: "bullhorn.initial_refresh_token".to_string(),
        })
    }

    /// Produces a usable access token for this run.
    ///
    /// An `invalid_grant` answer is retried exactly once with the fallback
    /// token. The rotated refresh token is written to `store` before the
    /// grant is returned.
    pub async fn obtain<K: SecretStore + ?Sized>(&self, store: &K) -> Result<TokenGrant> {
        let primary = self.starting_refresh_token(store).await?;
        let mut credential = self.config.credential(primary);

        let grant = match self.refresh(&credential).await {
            Ok(grant) => grant,
            Err(SyncError::InvalidGrant { body }) => {
                let fallback = match self.config.fallback_refresh_token() {
                    Some(token) if token != credential.refresh_token => token.to_string(),
                    _ => {
                        tracing::error!("❌ Refresh token rejected and no distinct fallback token configured");
                        return Err(SyncError::InvalidGrant { body });
                    }
                };
                tracing::warn!("⚠️ Refresh token invalid or expired, retrying once with fallback token");
                credential.refresh_token = fallback;
                self.refresh(&credential).await?
            }
            Err(e) => return Err(e),
        };

        store
            .set(&self.config.refresh_token_secret, &grant.refresh_token)
            .await?;
        tracing::info!("💾 Rotated refresh token persisted to secret store");

        Ok(grant)
    }
}

/// Authorization codes are usually copied out of a redirect URL and arrive percent-encoded.
fn decode_authorization_code(code: &str) -> String {
    let trimmed = code.trim();
    if !trimmed.contains('%') {
        return trimmed.to_string();
    }
    url::form_urlencoded::parse(format!("code={}", trimmed).as_bytes())
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}
