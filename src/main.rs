/// Main Application: sincronização amoCRM ⇄ Google Sheets
///
/// Arquitetura:
/// - Webhook do amoCRM grava/atualiza a linha do lead na planilha
/// - Job periódico lê a coluna de orçamento e atualiza o price no amoCRM
/// - OAuth2 do amoCRM com refresh automático e token persistido em arquivo

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use amocrm_sheets_sync::{
    auth::{handle_oauth_callback, start_oauth_flow, FileTokenStore, OAuth2Client, OAuth2Config, OAuth2State, TokenManager},
    config::Settings,
    handlers::{handle_amocrm_webhook, health_check},
    jobs::{BudgetSyncJob, CursorFile, SyncScheduler},
    services::{AmoCrmClient, GoogleSheetsService, ServiceAccountAuth},
    utils::logging::*,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 🔧 Carregar variáveis de ambiente do arquivo .env (se existir)
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if dotenv_loaded {
        tracing::info!("✅ Arquivo .env carregado com sucesso");
    } else {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Carregar e validar configurações: qualquer problema encerra com código 1
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            log_error(&format!("❌ Falha ao carregar configuração: {}", e));
            std::process::exit(1);
        }
    };
    if let Err(problems) = settings.validate() {
        for problem in &problems {
            log_validation_error("config", problem);
        }
        log_error(&format!("❌ Configuração inválida ({} problema(s))", problems.len()));
        std::process::exit(1);
    }
    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    // OAuth2 do amoCRM (token carregado uma única vez do arquivo)
    let oauth_client = OAuth2Client::new(OAuth2Config::from_settings(&settings.amocrm))
        .context("Failed to build OAuth2 client")?;
    let token_store = Arc::new(FileTokenStore::new(&settings.amocrm.token_file));
    let token_manager = Arc::new(TokenManager::new(oauth_client, token_store).await);
    if token_manager.current_record().await.is_none() {
        log_warning("⚠️ Nenhum token do amoCRM salvo - autorize em /oauth/login");
    }

    let crm = Arc::new(
        AmoCrmClient::new(
            settings.amocrm.api_base_url(),
            token_manager.clone(),
            Duration::from_millis(settings.amocrm.request_delay_ms),
        )
        .context("Failed to build amoCRM client")?,
    );
    log_info(&format!("⚡ [AmoCRM] Cliente configurado para {}", settings.amocrm.bare_domain()));

    let sheets_auth = ServiceAccountAuth::from_file(&settings.google_sheets.credentials_path)
        .with_context(|| {
            format!(
                "Failed to load Google credentials from {}",
                settings.google_sheets.credentials_path
            )
        })?;
    let sheets = Arc::new(
        GoogleSheetsService::new(&settings.google_sheets, Arc::new(sheets_auth))
            .context("Failed to build Google Sheets client")?,
    );
    log_info(&format!("📄 [Sheets] Planilha {} configurada", settings.google_sheets.spreadsheet_id));

    let mut sync_job = BudgetSyncJob::new(sheets.clone(), crm.clone());
    if let Some(cursor_file) = &settings.sync.cursor_file {
        sync_job = sync_job.with_cursor_file(CursorFile::new(cursor_file)).await;
    }
    let sync_job = Arc::new(sync_job);

    let scheduler = SyncScheduler::new(sync_job.clone(), settings.sync.interval_seconds);
    if settings.sync.enabled {
        scheduler.start().await;
    } else {
        log_warning("⚠️ Job de sincronização desabilitado (sync.enabled = false)");
    }

    let app_state = Arc::new(AppState {
        settings: settings.clone(),
        token_manager: token_manager.clone(),
        crm,
        sheets,
        sync_job,
    });

    let oauth_state = Arc::new(OAuth2State { token_manager });
    let oauth_router = Router::new()
        .route("/oauth/login", get(start_oauth_flow))
        .route("/oauth/callback", get(handle_oauth_callback))
        .with_state(oauth_state);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(handle_amocrm_webhook))
        .with_state(app_state)
        .merge(oauth_router)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log_server_startup(settings.server.port);
    log_server_ready(&addr);

    // Graceful shutdown com signal handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log_info("📴 Sinal de desligamento recebido");
}
