//! Token Store
//!
//! Persistência do `TokenRecord`. O registro é sempre sobrescrito por inteiro.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::error::AuthResult;
use super::token::TokenRecord;
use crate::utils::logging::*;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` quando ainda não existe token salvo
    async fn load(&self) -> AuthResult<Option<TokenRecord>>;

    async fn save(&self, token: &TokenRecord) -> AuthResult<()>;
}

/// Token em arquivo JSON (`access_token`, `refresh_token`, `expires_in`, `obtained_at`)
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> AuthResult<Option<TokenRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let token: TokenRecord = serde_json::from_str(&content)?;
                log_info(&format!("📂 [TokenStore] Token carregado de {}", self.path.display()));
                Ok(Some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, token: &TokenRecord) -> AuthResult<()> {
        let json = serde_json::to_string(token)?;

        // escreve ao lado e renomeia: nunca deixa um arquivo pela metade
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        log_info(&format!("💾 [TokenStore] Token salvo em {}", self.path.display()));
        Ok(())
    }
}

/// Armazenamento em memória, para testes e execuções sem disco
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: TokenRecord) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    pub async fn snapshot(&self) -> Option<TokenRecord> {
        self.token.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> AuthResult<Option<TokenRecord>> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &TokenRecord) -> AuthResult<()> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }
}
