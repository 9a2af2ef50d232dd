//! Adaptador da API v4 do Google Sheets
//!
//! Leitura de linhas a partir de um offset (job de orçamento) e upsert da
//! linha de um lead (webhook). Autenticação via service account com escopo
//! `spreadsheets`.

use async_trait::async_trait;
use google_cloud_auth::credentials::service_account::{AccessSpecifier, Builder};
use google_cloud_auth::credentials::{CacheableResource, Credentials};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::GoogleSheetsSettings;
use crate::models::budget_row::parse_lead_id;
use crate::models::LeadRow;
use crate::utils::logging::*;
use crate::utils::{status_text, truncate_with_suffix};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Última coluna da planilha (A..H)
const LAST_COLUMN: &str = "H";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Google credentials error: {0}")]
    Credentials(String),

    #[error("Sheets API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SheetsResult<T> = Result<T, SheetsError>;

/// Fonte de linhas consumida pelo job de orçamento
#[async_trait]
pub trait SheetRowSource: Send + Sync {
    /// Linhas a partir do offset (0-based) até o fim dos dados
    async fn read_rows_from(&self, offset: usize) -> SheetsResult<Vec<Vec<String>>>;
}

/// Fornece o header `Authorization` das chamadas ao Sheets
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn authorization_header(&self) -> SheetsResult<String>;
}

/// Credenciais de service account (arquivo JSON baixado do console)
pub struct ServiceAccountAuth {
    credentials: Credentials,
}

impl ServiceAccountAuth {
    pub fn from_file(path: impl AsRef<Path>) -> SheetsResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let key: Value = serde_json::from_str(&raw)?;

        let credentials = Builder::new(key)
            .with_access_specifier(AccessSpecifier::from_scopes([SPREADSHEETS_SCOPE]))
            .build()
            .map_err(|e| SheetsError::Credentials(e.to_string()))?;

        Ok(Self { credentials })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    async fn authorization_header(&self) -> SheetsResult<String> {
        let headers = match self
            .credentials
            .headers(http::Extensions::new())
            .await
            .map_err(|e| SheetsError::Credentials(e.to_string()))?
        {
            CacheableResource::New { data, .. } => data,
            _ => {
                return Err(SheetsError::Credentials(
                    "credentials returned no headers".to_string(),
                ))
            }
        };

        headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| SheetsError::Credentials("missing Authorization header".to_string()))
    }
}

/// Token fixo (testes e execução local com `gcloud auth print-access-token`)
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn authorization_header(&self) -> SheetsResult<String> {
        Ok(format!("Bearer {}", self.0))
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct GoogleSheetsService {
    http_client: Client,
    api_base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    auth: Arc<dyn AccessTokenProvider>,
}

impl GoogleSheetsService {
    pub fn new(settings: &GoogleSheetsSettings, auth: Arc<dyn AccessTokenProvider>) -> SheetsResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http_client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: settings.spreadsheet_id.clone(),
            sheet_name: settings.sheet_name.clone(),
            auth,
        })
    }

    /// `Лист1!A1:H` (nomes com espaço ou pontuação vão entre aspas simples)
    pub fn range(&self, cells: &str) -> String {
        format!("{}!{}", quote_sheet_name(&self.sheet_name), cells)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base_url,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn get_values(&self, range: &str) -> SheetsResult<Vec<Vec<String>>> {
        let response = self
            .http_client
            .get(self.values_url(range))
            .header("Authorization", self.auth.authorization_header().await?)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: ValueRange = response.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Linhas a partir do offset; offset `n` corresponde à linha A1 `n + 1`
    pub async fn read_rows_from(&self, offset: usize) -> SheetsResult<Vec<Vec<String>>> {
        let range = self.range(&format!("A{}:{}", offset + 1, LAST_COLUMN));
        self.get_values(&range).await
    }

    /// Número da linha (1-based) cujo ID na coluna A é o do lead
    pub async fn find_lead_row(&self, lead_id: u64) -> SheetsResult<Option<usize>> {
        let ids = self.get_values(&self.range("A:A")).await?;

        // comparação numérica: "10.0" e "010" também são o lead 10
        Ok(ids
            .iter()
            .position(|row| parse_lead_id(row.first().map(String::as_str)) == Some(lead_id))
            .map(|index| index + 1))
    }

    /// Acrescenta a linha ao fim da tabela (`INSERT_ROWS`)
    pub async fn append_lead_row(&self, row: &LeadRow) -> SheetsResult<()> {
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.values_url(&self.range(&format!("A1:{}", LAST_COLUMN)))
        );

        let response = self
            .http_client
            .post(url)
            .header("Authorization", self.auth.authorization_header().await?)
            .json(&json!({ "values": [row.to_cells()] }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Sobrescreve A{n}:H{n}
    pub async fn update_lead_row(&self, row_number: usize, row: &LeadRow) -> SheetsResult<()> {
        let range = self.range(&format!("A{n}:{LAST_COLUMN}{n}", n = row_number));
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(&range));

        let response = self
            .http_client
            .put(url)
            .header("Authorization", self.auth.authorization_header().await?)
            .json(&json!({ "range": range, "values": [row.to_cells()] }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Atualiza a linha existente ou acrescenta uma nova; `true` quando atualizou
    pub async fn upsert_lead_row(&self, row: &LeadRow) -> SheetsResult<bool> {
        match self.find_lead_row(row.id).await? {
            Some(row_number) => {
                self.update_lead_row(row_number, row).await?;
                log_lead_row_upserted(row.id, true);
                Ok(true)
            }
            None => {
                self.append_lead_row(row).await?;
                log_lead_row_upserted(row.id, false);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl SheetRowSource for GoogleSheetsService {
    async fn read_rows_from(&self, offset: usize) -> SheetsResult<Vec<Vec<String>>> {
        GoogleSheetsService::read_rows_from(self, offset).await
    }
}

async fn check_status(response: reqwest::Response) -> SheetsResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status_text(status)
    } else {
        truncate_with_suffix(&body, 300, "...")
    };
    log_error(&format!("❌ [Sheets] HTTP {}: {}", status.as_u16(), message));

    Err(SheetsError::Api {
        status: status.as_u16(),
        message,
    })
}

fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
