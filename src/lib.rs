// Biblioteca do middleware amoCRM ⇄ Google Sheets
// Expõe módulos para uso em testes e no binário

pub mod auth;
pub mod config;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

/// Estado compartilhado pelos handlers HTTP
///
/// Uma única instância de cada serviço: o throttle do amoCRM, o token e o
/// cursor do job são compartilhados entre webhook, job e health check.
pub struct AppState {
    pub settings: config::Settings,
    pub token_manager: Arc<auth::TokenManager>,
    pub crm: Arc<services::AmoCrmClient>,
    pub sheets: Arc<services::GoogleSheetsService>,
    pub sync_job: Arc<jobs::BudgetSyncJob>,
}
