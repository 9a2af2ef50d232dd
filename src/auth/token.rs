use serde::{Deserialize, Serialize};

/// Margem de segurança: token que expira em menos de 60s já é tratado como inválido
pub const EXPIRY_SKEW_MS: i64 = 60_000;

/// Registro persistido do token OAuth2 do amoCRM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Validade anunciada na emissão, em segundos
    pub expires_in: i64,
    /// Epoch em milissegundos do momento da emissão
    pub obtained_at: i64,
}

impl TokenRecord {
    /// Cria o registro a partir da resposta do endpoint de token
    pub fn mint(response: TokenResponse, obtained_at: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            obtained_at,
        }
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.obtained_at
            .saturating_add(self.expires_in.saturating_mul(1000))
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms().saturating_sub(EXPIRY_SKEW_MS)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_ms())
    }

    /// Segundos restantes até a expiração real (sem a margem)
    pub fn time_to_expiry_secs(&self, now_ms: i64) -> i64 {
        ((self.expires_at_ms() - now_ms) / 1000).max(0)
    }
}

/// Resposta do endpoint `/oauth2/access_token`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
