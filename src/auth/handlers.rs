//! OAuth2 HTTP Handlers
//!
//! Endpoints para iniciar e completar a autorização da integração amoCRM

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Json, Redirect},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::TokenManager;
use crate::utils::logging::*;
use crate::utils::mask_secret;

/// Parâmetros do callback OAuth2
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    code: Option<String>,
    #[allow(dead_code)]
    state: Option<String>,
    error: Option<String>,
}

/// State compartilhado para os handlers OAuth2
pub struct OAuth2State {
    pub token_manager: Arc<TokenManager>,
}

type HandlerError = (StatusCode, Json<Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (status, Json(json!({ "error": message.into() })))
}

/// GET /oauth/login
///
/// Redireciona para a página de autorização do amoCRM
pub async fn start_oauth_flow(State(oauth_state): State<Arc<OAuth2State>>) -> Redirect {
    let auth_url = oauth_state.token_manager.oauth_client().config().authorization_url();
    log_info(&format!("↗️  [OAuth2] Redirecionando para: {}", auth_url));
    Redirect::to(&auth_url)
}

/// GET /oauth/callback?code=XXX
///
/// Troca o code por tokens e persiste o resultado
pub async fn handle_oauth_callback(
    State(oauth_state): State<Arc<OAuth2State>>,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Html<&'static str>, HandlerError> {
    log_info("📥 [OAuth2] Callback recebido");

    if let Some(error) = params.error {
        log_error(&format!("❌ [OAuth2] Erro na autorização: {}", error));
        return Err(error_response(StatusCode::BAD_REQUEST, error));
    }

    let code = params.code.ok_or_else(|| {
        log_error("❌ [OAuth2] Code não recebido no callback");
        error_response(StatusCode::BAD_REQUEST, "No code provided")
    })?;

    log_info(&format!("🔑 [OAuth2] Code recebido: {}", mask_secret(&code)));

    oauth_state
        .token_manager
        .exchange_authorization_code(&code)
        .await
        .map_err(|e| {
            log_error(&format!("❌ [OAuth2] Falha ao obter token: {}", e));
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Html("OAuth успешен! Токены сохранены."))
}
