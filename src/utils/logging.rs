use tracing::{debug, error, info, warn};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_lead_budget_updated(lead_id: u64, budget: f64) {
    info!("💰 Lead {} atualizado com orçamento {}", lead_id, budget);
}

pub fn log_lead_row_upserted(lead_id: u64, updated: bool) {
    if updated {
        info!("✏️ Linha do lead {} atualizada na planilha", lead_id);
    } else {
        info!("➕ Lead {} adicionado à planilha", lead_id);
    }
}

pub fn log_amocrm_api_error(endpoint: &str, status: Option<u16>, error: &str) {
    error!("amoCRM API error: {} - Status: {:?} - Error: {}", endpoint, status, error);
}

pub fn log_rate_limited(lead_id: u64, retry_after_secs: u64, attempt: u32) {
    warn!("⏳ [AmoCRM] Rate limit no lead {} (tentativa {}), aguardando {}s",
          lead_id, attempt, retry_after_secs);
}

pub fn log_sync_tick(rows_read: usize, updated: usize, skipped: usize, failed: usize, cursor: usize) {
    info!("🔄 [SyncBudget] {} linhas lidas - {} atualizadas, {} ignoradas, {} falhas - cursor: {}",
          rows_read, updated, skipped, failed, cursor);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 amoCRM-Sheets sync server starting on port {}", port);
}

pub fn log_server_ready(addr: &str) {
    info!("✅ Server ready and listening on http://{}", addr);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
