//! Cliente HTTP da API v4 do amoCRM
//!
//! Ponto único de saída para o amoCRM. Atualizações de lead respeitam um
//! intervalo mínimo entre requisições e, em 429, aguardam o `Retry-After`
//! informado pelo servidor antes de repetir.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::auth::{AuthError, TokenManager};
use crate::utils::logging::*;
use crate::utils::{status_text, truncate_with_suffix};

/// Espera padrão quando o 429 não traz `Retry-After` utilizável
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

/// Intervalo mínimo padrão entre atualizações de lead
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Failed to fetch contact {contact_id}: {status_text}")]
    ContactFetchFailed { contact_id: u64, status_text: String },

    #[error("Failed to fetch user {user_id}: {status_text}")]
    UserFetchFailed { user_id: u64, status_text: String },

    #[error("Failed to update lead {lead_id}: HTTP {status}: {status_text}")]
    LeadUpdateFailed { lead_id: u64, status: u16, status_text: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type CrmResult<T> = Result<T, CrmError>;

/// Contrato usado pelo job de orçamento
#[async_trait]
pub trait LeadBudgetUpdater: Send + Sync {
    async fn update_lead_budget(&self, lead_id: u64, budget: f64) -> CrmResult<()>;
}

/// Contato do amoCRM (campos usados na planilha)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomFieldValue>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomFieldValue {
    #[serde(default)]
    pub field_code: Option<String>,
    #[serde(default)]
    pub values: Vec<CustomFieldEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomFieldEntry {
    pub value: Value,
}

impl ContactRecord {
    /// Primeiro valor do campo de código `PHONE`
    pub fn phone(&self) -> Option<String> {
        self.custom_fields_values
            .as_ref()?
            .iter()
            .find(|field| field.field_code.as_deref() == Some("PHONE"))?
            .values
            .first()
            .map(|entry| match &entry.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

/// Usuário (responsável) do amoCRM
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Cliente amoCRM com throttle próprio
pub struct AmoCrmClient {
    http_client: Client,
    base_url: String,
    token_manager: Arc<TokenManager>,
    min_interval: Duration,
    /// Instante da última atualização de lead; o lock cobre espera + envio
    last_request_at: Mutex<Option<Instant>>,
}

impl AmoCrmClient {
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(
        base_url: impl Into<String>,
        token_manager: Arc<TokenManager>,
        min_interval: Duration,
    ) -> CrmResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_manager,
            min_interval,
            last_request_at: Mutex::new(None),
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// GET /api/v4/contacts/{id}
    pub async fn fetch_contact(&self, contact_id: u64) -> CrmResult<ContactRecord> {
        let url = format!("{}/api/v4/contacts/{}", self.base_url, contact_id);
        let response = self.get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            log_amocrm_api_error(&url, Some(status.as_u16()), &status_text(status));
            return Err(CrmError::ContactFetchFailed {
                contact_id,
                status_text: status_text(status),
            });
        }

        Ok(response.json().await?)
    }

    /// GET /api/v4/users/{id}
    pub async fn fetch_user(&self, user_id: u64) -> CrmResult<UserRecord> {
        let url = format!("{}/api/v4/users/{}", self.base_url, user_id);
        let response = self.get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            log_amocrm_api_error(&url, Some(status.as_u16()), &status_text(status));
            return Err(CrmError::UserFetchFailed {
                user_id,
                status_text: status_text(status),
            });
        }

        Ok(response.json().await?)
    }

    async fn get(&self, url: &str) -> CrmResult<Response> {
        let token = self.token_manager.ensure_valid_token().await?;
        tracing::debug!("GET {}", url);

        Ok(self.http_client
            .get(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await?)
    }

    /// PATCH /api/v4/leads/{id} com `{"price": budget}`
    ///
    /// Repete indefinidamente enquanto o servidor responder 429.
    pub async fn update_lead_budget(&self, lead_id: u64, budget: f64) -> CrmResult<()> {
        let url = format!("{}/api/v4/leads/{}", self.base_url, lead_id);
        let body = json!({ "price": price_value(budget) });

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self.send_throttled(&url, &body).await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = retry_after_secs(response.headers());
                log_rate_limited(lead_id, wait_secs, attempt);
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                continue;
            }

            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                log_amocrm_api_error(
                    &url,
                    Some(status.as_u16()),
                    &truncate_with_suffix(&error_body, 300, "..."),
                );
                return Err(CrmError::LeadUpdateFailed {
                    lead_id,
                    status: status.as_u16(),
                    status_text: status_text(status),
                });
            }

            if attempt > 1 {
                log_info(&format!("✅ [AmoCRM] Lead {} atualizado após {} tentativas", lead_id, attempt));
            }
            log_lead_budget_updated(lead_id, budget);
            return Ok(());
        }
    }

    /// Aguarda o intervalo mínimo, envia e registra o instante do envio
    async fn send_throttled(&self, url: &str, body: &Value) -> CrmResult<Response> {
        let mut last_request_at = self.last_request_at.lock().await;

        if let Some(previous) = *last_request_at {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        let token = self.token_manager.ensure_valid_token().await?;
        tracing::debug!("PATCH {} {}", url, body);

        let result = self.http_client
            .patch(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        // vale também para falhas: a janela do throttle cobre toda tentativa
        *last_request_at = Some(Instant::now());

        Ok(result?)
    }
}

#[async_trait]
impl LeadBudgetUpdater for AmoCrmClient {
    async fn update_lead_budget(&self, lead_id: u64, budget: f64) -> CrmResult<()> {
        AmoCrmClient::update_lead_budget(self, lead_id, budget).await
    }
}

/// Valores inteiros vão como inteiro no JSON (`500`, não `500.0`)
fn price_value(budget: f64) -> Value {
    if budget.fract() == 0.0 && budget.abs() < i64::MAX as f64 {
        json!(budget as i64)
    } else {
        json!(budget)
    }
}

/// Segundos do header `Retry-After`; padrão de 10s se ausente ou inválido
pub fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::tests::test_config;
    use crate::auth::token::now_ms;
    use crate::auth::{MemoryTokenStore, OAuth2Client, TokenRecord};
    use reqwest::header::HeaderValue;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    async fn token_manager_with(record: Option<TokenRecord>) -> Arc<TokenManager> {
        let store = match record {
            Some(record) => MemoryTokenStore::with_token(record),
            None => MemoryTokenStore::new(),
        };
        let client = OAuth2Client::new(test_config("http://127.0.0.1:9")).unwrap();
        Arc::new(TokenManager::new(client, Arc::new(store)).await)
    }

    async fn client(server: &MockServer, min_interval: Duration) -> AmoCrmClient {
        let tm = token_manager_with(Some(TokenRecord {
            access_token: "valid-token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 86_400,
            obtained_at: now_ms(),
        }))
        .await;
        AmoCrmClient::new(server.uri(), tm, min_interval).unwrap()
    }

    /// Registra o instante de cada requisição recebida
    struct RecordingResponder {
        hits: Arc<StdMutex<Vec<std::time::Instant>>>,
    }

    impl Respond for RecordingResponder {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.hits.lock().unwrap().push(std::time::Instant::now());
            ResponseTemplate::new(200).set_body_json(json!({"id": 1}))
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_secs(&headers), 3);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);
    }

    #[test]
    fn test_price_value() {
        assert_eq!(price_value(500.0), json!(500));
        assert_eq!(price_value(99.5), json!(99.5));
    }

    #[test]
    fn test_contact_phone() {
        let contact: ContactRecord = serde_json::from_value(json!({
            "id": 5,
            "name": "Иван",
            "custom_fields_values": [
                {"field_code": "EMAIL", "values": [{"value": "a@b.c"}]},
                {"field_code": "PHONE", "values": [{"value": "+7 900 000-00-00"}, {"value": "2"}]}
            ]
        }))
        .unwrap();
        assert_eq!(contact.phone().as_deref(), Some("+7 900 000-00-00"));

        let no_fields: ContactRecord = serde_json::from_value(json!({"id": 6})).unwrap();
        assert!(no_fields.phone().is_none());
    }

    #[tokio::test]
    async fn test_update_lead_budget_sends_patch_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v4/leads/10"))
            .and(header("authorization", "Bearer valid-token"))
            .and(body_json(json!({"price": 500})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 10})))
            .expect(1)
            .mount(&server)
            .await;

        let crm = client(&server, Duration::from_millis(10)).await;
        crm.update_lead_budget(10, 500.0).await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limited_once_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v4/leads/7"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v4/leads/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .with_priority(2)
            .mount(&server)
            .await;

        let crm = client(&server, Duration::from_millis(10)).await;
        let started = std::time::Instant::now();
        crm.update_lead_budget(7, 1200.0).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_other_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"title\":\"Bad Request\"}"))
            .mount(&server)
            .await;

        let crm = client(&server, Duration::from_millis(10)).await;
        let err = crm.update_lead_budget(3, 42.0).await.unwrap_err();

        match err {
            CrmError::LeadUpdateFailed { lead_id, status, status_text } => {
                assert_eq!(lead_id, 3);
                assert_eq!(status, 400);
                assert_eq!(status_text, "Bad Request");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consecutive_updates_are_spaced() {
        let server = MockServer::start().await;
        let hits = Arc::new(StdMutex::new(Vec::new()));
        Mock::given(method("PATCH"))
            .respond_with(RecordingResponder { hits: hits.clone() })
            .mount(&server)
            .await;

        let min_interval = Duration::from_millis(300);
        let crm = client(&server, min_interval).await;
        crm.update_lead_budget(1, 1.0).await.unwrap();
        crm.update_lead_budget(2, 2.0).await.unwrap();
        crm.update_lead_budget(3, 3.0).await.unwrap();

        let hits = hits.lock().unwrap().clone();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= min_interval);
        }
    }

    #[tokio::test]
    async fn test_failed_attempt_also_starts_throttle_window() {
        let server = MockServer::start().await;
        let hits = Arc::new(StdMutex::new(Vec::new()));
        Mock::given(method("PATCH"))
            .and(path("/api/v4/leads/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/v4/leads/2"))
            .respond_with(RecordingResponder { hits: hits.clone() })
            .mount(&server)
            .await;

        let min_interval = Duration::from_millis(300);
        let crm = client(&server, min_interval).await;
        let before_first = std::time::Instant::now();
        assert!(crm.update_lead_budget(1, 1.0).await.is_err());
        crm.update_lead_budget(2, 2.0).await.unwrap();

        let hits = hits.lock().unwrap().clone();
        assert!(hits[0].duration_since(before_first) >= min_interval);
    }

    #[tokio::test]
    async fn test_update_without_token_sends_nothing() {
        let server = MockServer::start().await;
        let tm = token_manager_with(None).await;
        let crm = AmoCrmClient::new(server.uri(), tm, Duration::from_millis(10)).unwrap();

        let err = crm.update_lead_budget(1, 1.0).await.unwrap_err();
        assert!(matches!(err, CrmError::Auth(AuthError::NoRefreshToken)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_contact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/contacts/55"))
            .and(header("authorization", "Bearer valid-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 55,
                "name": "Мария",
                "custom_fields_values": [
                    {"field_code": "PHONE", "values": [{"value": "+79001112233"}]}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/contacts/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crm = client(&server, Duration::from_millis(10)).await;
        let contact = crm.fetch_contact(55).await.unwrap();
        assert_eq!(contact.name, "Мария");
        assert_eq!(contact.phone().as_deref(), Some("+79001112233"));

        let err = crm.fetch_contact(404).await.unwrap_err();
        assert!(matches!(
            err,
            CrmError::ContactFetchFailed { contact_id: 404, ref status_text } if status_text == "Not Found"
        ));
    }

    #[tokio::test]
    async fn test_fetch_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9, "name": "Manager"})))
            .mount(&server)
            .await;

        let crm = client(&server, Duration::from_millis(10)).await;
        assert_eq!(crm.fetch_user(9).await.unwrap().name, "Manager");
    }
}
