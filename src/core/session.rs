use crate::domain::model::Session;
use crate::utils::error::{Result, SyncError};
use crate::utils::logger::mask_secret;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "BhRestToken")]
    bh_rest_token: Option<String>,
    #[serde(rename = "restUrl")]
    rest_url: Option<String>,
}

/// Trades an access token for a `BhRestToken` and the tenant REST base address.
pub struct SessionResolver {
    client: Client,
    login_base_url: String,
}

impl SessionResolver {
    pub fn new(client: Client, login_base_url: impl Into<String>) -> Self {
        Self {
            client,
            login_base_url: login_base_url.into(),
        }
    }

    pub async fn resolve(&self, access_token: &str) -> Result<Session> {
        let login_url = format!(
            "{}/rest-services/login",
            self.login_base_url.trim_end_matches('/')
        );
        tracing::debug!("🌐 Logging in at {}", login_url);

        let response = self
            .client
            .post(&login_url)
            .query(&[("version", "2.0"), ("access_token", access_token)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::SessionError {
                message: format!("login returned {}: {}", status, body),
            });
        }

        let login: LoginResponse = response.json().await?;
        let rest_token = login
            .bh_rest_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::SessionError {
                message: "login response carried no BhRestToken".to_string(),
            })?;
        let rest_url = login
            .rest_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SyncError::SessionError {
                message: "login response carried no restUrl".to_string(),
            })?;

        let session = Session {
            rest_token,
            rest_url: normalize_base_url(&rest_url),
        };
        tracing::info!(
            "🗝️ Session established (BhRestToken {}, REST URL {})",
            mask_secret(&session.rest_token),
            session.rest_url
        );
        Ok(session)
    }
}

/// Ensures exactly one trailing `/`.
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}
