//! OAuth2 HTTP Client
//!
//! Cliente HTTP isolado para o endpoint `/oauth2/access_token` do amoCRM

use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::error::{AuthError, AuthResult};
use super::token::TokenResponse;
use super::OAuth2Config;
use crate::utils::logging::*;
use crate::utils::{mask_secret, status_text};

/// Tipo de concessão enviada ao endpoint de token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    fn as_str(self) -> &'static str {
        match self {
            Grant::AuthorizationCode => "authorization_code",
            Grant::RefreshToken => "refresh_token",
        }
    }

    fn failure(self, status_text: String) -> AuthError {
        match self {
            Grant::AuthorizationCode => AuthError::AuthExchangeFailed(status_text),
            Grant::RefreshToken => AuthError::RefreshFailed(status_text),
        }
    }
}

/// Cliente OAuth2 para amoCRM
pub struct OAuth2Client {
    config: OAuth2Config,
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(config: OAuth2Config) -> AuthResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { config, http_client })
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Trocar authorization code por access + refresh token
    pub async fn exchange_code_for_token(&self, code: &str) -> AuthResult<TokenResponse> {
        log_info(&format!("🔐 [OAuth2] Trocando authorization code {} por token...", mask_secret(code)));
        self.request_token(Grant::AuthorizationCode, code).await
    }

    /// Emitir novo par de tokens a partir do refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        log_info("🔄 [OAuth2] Renovando access token via refresh_token...");
        self.request_token(Grant::RefreshToken, refresh_token).await
    }

    async fn request_token(&self, grant: Grant, credential: &str) -> AuthResult<TokenResponse> {
        let url = self.config.token_url();

        let mut body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "grant_type": grant.as_str(),
            "redirect_uri": self.config.redirect_uri,
        });
        match grant {
            Grant::AuthorizationCode => body["code"] = json!(credential),
            Grant::RefreshToken => body["refresh_token"] = json!(credential),
        }

        let response = self.http_client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log_error(&format!("❌ [OAuth2] {} falhou: {} - {}", grant.as_str(), status, error_text));
            return Err(grant.failure(status_text(status)));
        }

        let token_response: TokenResponse = response.json().await?;

        log_info(&format!("✅ [OAuth2] Access token obtido: {}", mask_secret(&token_response.access_token)));

        Ok(token_response)
    }
}
