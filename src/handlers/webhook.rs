//! POST /webhook
//!
//! Recebe os eventos de lead do amoCRM (form-urlencoded ou JSON) e grava a
//! linha de cada lead relevante na planilha. Falhas por lead são apenas
//! registradas em log; a resposta é sempre 200 depois do processamento.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use crate::models::lead_row::format_created_at;
use crate::models::webhook::parse_form_body;
use crate::models::{LeadChange, LeadEvent, LeadRow, LeadsWebhook};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub async fn handle_amocrm_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received("/webhook", "POST");

    let payload = parse_payload(&headers, &body)?;

    let Some(webhook) = LeadsWebhook::from_payload(&payload) else {
        log_info("📭 [Webhook] Payload sem leads, ignorado");
        return Ok(Json(json!({ "status": "ignored" })));
    };

    for (lead, change) in webhook.unique_leads() {
        if let Err(e) = process_lead(&state, &lead, change).await {
            log_error(&format!("❌ [Webhook] Falha ao processar lead {}: {}", lead.id, e));
        }
    }

    log_request_processed("/webhook", 200, start_time.elapsed().as_millis() as u64);
    Ok(Json(json!({ "status": "ok" })))
}

fn parse_payload(headers: &HeaderMap, body: &Bytes) -> AppResult<Value> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        return Ok(serde_json::from_slice(body)?);
    }

    let text = std::str::from_utf8(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid UTF-8 in request body: {}", e)))?;
    Ok(parse_form_body(text))
}

/// Lead ganho: veio em `status` e está no status/pipeline de sucesso
fn is_won(state: &AppState, lead: &LeadEvent, change: LeadChange) -> bool {
    change.is_status_changed
        && lead.status_id == Some(state.settings.amocrm.success_status_id)
        && lead.pipeline_id == Some(state.settings.amocrm.pipeline_id)
}

async fn process_lead(state: &AppState, lead: &LeadEvent, change: LeadChange) -> AppResult<()> {
    let won = is_won(state, lead, change);
    if !(change.is_new || won || change.is_updated) {
        tracing::debug!("Lead {} ignorado (mudança de status sem conclusão)", lead.id);
        return Ok(());
    }

    let (contact_name, phone) = match lead.contact_ids.first() {
        Some(&contact_id) => match state.crm.fetch_contact(contact_id).await {
            Ok(contact) => {
                let phone = contact.phone().unwrap_or_default();
                (contact.name, phone)
            }
            Err(e) => {
                log_warning(&format!("⚠️ [Webhook] Contato {} indisponível: {}", contact_id, e));
                (String::new(), String::new())
            }
        },
        None => (String::new(), String::new()),
    };

    let responsible_user = match lead.responsible_user_id {
        Some(user_id) => match state.crm.fetch_user(user_id).await {
            Ok(user) => user.name,
            Err(e) => {
                log_warning(&format!("⚠️ [Webhook] Usuário {} indisponível: {}", user_id, e));
                String::new()
            }
        },
        None => String::new(),
    };

    let row = LeadRow {
        id: lead.id,
        created_at: lead.created_at.map(format_created_at).unwrap_or_default(),
        phone,
        contact_name,
        responsible_user,
        responsible_user_id: lead.responsible_user_id,
        // sem price no evento a coluna recebe 0
        price: Some(lead.price.unwrap_or(0.0)),
        is_completed: won,
    };

    state.sheets.upsert_lead_row(&row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn post_webhook(state: Arc<AppState>, content_type: &str, body: &str) -> (StatusCode, Value) {
        let app = Router::new()
            .route("/webhook", post(handle_amocrm_webhook))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", content_type)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_payload_without_leads_is_ignored() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;
        let state = test_state(&crm, &sheets).await;

        let (status, body) = post_webhook(
            state,
            "application/x-www-form-urlencoded",
            "account%5Bid%5D=1&account%5Bsubdomain%5D=empresa",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ignored" }));
    }

    #[tokio::test]
    async fn test_won_lead_is_appended_with_contact_and_user() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v4/contacts/55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 55,
                "name": "Мария",
                "custom_fields_values": [
                    {"field_code": "PHONE", "values": [{"value": "+79001112233"}]}
                ]
            })))
            .expect(1)
            .mount(&crm)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 123, "name": "Manager"})))
            .expect(1)
            .mount(&crm)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"A(%3A|:)A$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": [["1"]]})))
            .mount(&sheets)
            .await;

        let expected = LeadRow {
            id: 25_399_013,
            created_at: "14.11.2023, 22:13:20".to_string(),
            phone: "+79001112233".to_string(),
            contact_name: "Мария".to_string(),
            responsible_user: "Manager".to_string(),
            responsible_user_id: Some(123),
            price: Some(1500.0),
            is_completed: true,
        };
        Mock::given(method("POST"))
            .and(path_regex(r":append$"))
            .and(wiremock::matchers::body_json(json!({ "values": [expected.to_cells()] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&sheets)
            .await;

        let state = test_state(&crm, &sheets).await;
        let body = "leads%5Bstatus%5D%5B0%5D%5Bid%5D=25399013\
            &leads%5Bstatus%5D%5B0%5D%5Bstatus_id%5D=142\
            &leads%5Bstatus%5D%5B0%5D%5Bpipeline_id%5D=7\
            &leads%5Bstatus%5D%5B0%5D%5Bprice%5D=1500\
            &leads%5Bstatus%5D%5B0%5D%5Bresponsible_user_id%5D=123\
            &leads%5Bstatus%5D%5B0%5D%5Bcreated_at%5D=1700000000\
            &leads%5Bstatus%5D%5B0%5D%5Bcontacts%5D%5B0%5D%5Bid%5D=55";

        let (status, response) = post_webhook(state, "application/x-www-form-urlencoded", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_status_change_to_other_stage_is_skipped() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;

        // nenhuma chamada externa esperada
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&sheets)
            .await;

        let state = test_state(&crm, &sheets).await;
        let payload = json!({
            "leads": {"status": [{"id": "9", "status_id": "143", "pipeline_id": "7"}]}
        });

        let (status, response) = post_webhook(state, "application/json", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_missing_price_is_written_as_zero() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"A(%3A|:)A$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": []})))
            .mount(&sheets)
            .await;

        let expected = LeadRow {
            id: 88,
            created_at: String::new(),
            phone: String::new(),
            contact_name: String::new(),
            responsible_user: String::new(),
            responsible_user_id: None,
            price: Some(0.0),
            is_completed: false,
        };
        Mock::given(method("POST"))
            .and(path_regex(r":append$"))
            .and(wiremock::matchers::body_json(json!({ "values": [expected.to_cells()] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&sheets)
            .await;

        let state = test_state(&crm, &sheets).await;
        let payload = json!({ "leads": {"add": [{"id": "88"}]} });

        let (status, _) = post_webhook(state, "application/json", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sheet_failure_still_returns_ok() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .expect(1)
            .mount(&sheets)
            .await;

        let state = test_state(&crm, &sheets).await;
        let payload = json!({ "leads": {"add": [{"id": 77, "price": 10}]} });

        let (status, response) = post_webhook(state, "application/json", &payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let crm = MockServer::start().await;
        let sheets = MockServer::start().await;
        let state = test_state(&crm, &sheets).await;

        let app = Router::new()
            .route("/webhook", post(handle_amocrm_webhook))
            .with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
