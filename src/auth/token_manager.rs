//! Token Manager
//!
//! Fornece um access token válido para toda chamada ao amoCRM: usa o token
//! em memória enquanto válido e renova via refresh_token quando expira.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::error::{AuthError, AuthResult};
use super::store::TokenStore;
use super::token::{now_ms, TokenRecord, TokenResponse};
use super::OAuth2Client;
use crate::utils::logging::*;
use crate::utils::mask_secret;

/// Gerenciador de tokens OAuth2
pub struct TokenManager {
    oauth_client: OAuth2Client,
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<TokenRecord>>,
    /// Serializa refreshes concorrentes
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Cria o gerenciador carregando o token persistido (uma única vez)
    pub async fn new(oauth_client: OAuth2Client, store: Arc<dyn TokenStore>) -> Self {
        let token = match store.load().await {
            Ok(Some(token)) => {
                log_info(&format!(
                    "✅ [TokenManager] Token carregado (expira em {}s)",
                    token.time_to_expiry_secs(now_ms())
                ));
                Some(token)
            }
            Ok(None) => {
                log_warning("⚠️ [TokenManager] Nenhum token salvo. Autorize em /oauth/login");
                None
            }
            Err(e) => {
                log_error(&format!("❌ [TokenManager] Falha ao carregar token: {}", e));
                None
            }
        };

        Self {
            oauth_client,
            store,
            token: RwLock::new(token),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn oauth_client(&self) -> &OAuth2Client {
        &self.oauth_client
    }

    /// Access token atual se ainda válido; `None` caso contrário (sem rede)
    pub async fn current_token(&self) -> Option<String> {
        let token = self.token.read().await;
        match token.as_ref() {
            Some(record) if record.is_valid() => Some(record.access_token.clone()),
            Some(_) => {
                log_info("⌛ [TokenManager] Access token expirado ou prestes a expirar");
                None
            }
            None => None,
        }
    }

    /// Cópia do registro completo em memória
    pub async fn current_record(&self) -> Option<TokenRecord> {
        self.token.read().await.clone()
    }

    /// Troca única do authorization code (callback OAuth2)
    pub async fn exchange_authorization_code(&self, code: &str) -> AuthResult<String> {
        let _guard = self.refresh_lock.lock().await;
        let response = self.oauth_client.exchange_code_for_token(code).await?;
        let access_token = self.mint(response).await?;
        log_info("✅ [TokenManager] Token obtido via authorization code");
        Ok(access_token)
    }

    /// Renova o token com o refresh_token salvo, mesmo que o atual ainda seja válido
    pub async fn refresh(&self) -> AuthResult<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Token válido, renovando se necessário
    pub async fn ensure_valid_token(&self) -> AuthResult<String> {
        if let Some(token) = self.current_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // outro chamador pode ter renovado enquanto esperávamos o lock
        if let Some(token) = self.current_token().await {
            return Ok(token);
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> AuthResult<String> {
        let refresh_token = {
            let token = self.token.read().await;
            match token.as_ref() {
                Some(record) if !record.refresh_token.is_empty() => record.refresh_token.clone(),
                _ => return Err(AuthError::NoRefreshToken),
            }
        };

        let response = self.oauth_client.refresh_token(&refresh_token).await?;
        let access_token = self.mint(response).await?;
        log_info("✅ [TokenManager] Token renovado com sucesso");
        Ok(access_token)
    }

    /// Cria o novo registro, persiste e substitui o atual por inteiro
    async fn mint(&self, response: TokenResponse) -> AuthResult<String> {
        if response.access_token.is_empty() {
            log_error("🚨 [TokenManager] Endpoint de token respondeu sem access_token");
            return Err(AuthError::TokenUnavailable);
        }

        let record = TokenRecord::mint(response, now_ms());
        let access_token = record.access_token.clone();

        let mut token = self.token.write().await;
        if let Err(e) = self.store.save(&record).await {
            // o refresh token antigo pode já ter sido revogado: mantém o novo em memória
            log_error(&format!("❌ [TokenManager] Falha ao persistir token: {}", e));
        }
        *token = Some(record);

        log_info(&format!("🔑 [TokenManager] Novo access token: {}", mask_secret(&access_token)));
        Ok(access_token)
    }
}
