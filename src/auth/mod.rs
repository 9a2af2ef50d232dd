//! # amoCRM OAuth2 Authentication Module
//!
//! ## Responsabilidades:
//! - Redirecionar para a página de autorização do amoCRM
//! - Trocar authorization code por access/refresh token
//! - Renovar o access token antes de expirar (margem de 60s)
//! - Persistir o token a cada emissão
//!
//! ## Estrutura:
//! - `config.rs`: Configurações OAuth2
//! - `client.rs`: Cliente HTTP do endpoint de token
//! - `token.rs`: Registro do token e regra de validade
//! - `store.rs`: Persistência do token
//! - `token_manager.rs`: Gerenciamento de tokens
//! - `handlers.rs`: Handlers HTTP (login, callback)

pub mod config;
pub mod client;
pub mod error;
pub mod token;
pub mod store;
pub mod token_manager;
pub mod handlers;

pub use config::OAuth2Config;
pub use client::OAuth2Client;
pub use error::{AuthError, AuthResult};
pub use token::TokenRecord;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token_manager::TokenManager;
pub use handlers::{start_oauth_flow, handle_oauth_callback, OAuth2State};
