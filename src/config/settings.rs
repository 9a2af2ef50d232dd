use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub amocrm: AmoCrmSettings,
    pub google_sheets: GoogleSheetsSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AmoCrmSettings {
    /// Subdomínio da conta, ex: `empresa.amocrm.ru` (esquema é removido)
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Base das URLs OAuth2 (`/oauth` e `/oauth2/access_token`)
    pub oauth_base_url: String,
    /// Status "ganho" usado pelo webhook
    pub success_status_id: i64,
    pub pipeline_id: i64,
    /// Arquivo JSON onde o token OAuth2 é persistido
    pub token_file: String,
    /// Intervalo mínimo entre atualizações de lead (ms)
    pub request_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GoogleSheetsSettings {
    pub spreadsheet_id: String,
    /// Chave JSON da service account
    pub credentials_path: String,
    pub sheet_name: String,
    pub api_base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncSettings {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Sem arquivo o cursor recomeça do zero a cada restart
    #[serde(default)]
    pub cursor_file: Option<String>,
}

impl AmoCrmSettings {
    /// Domínio sem `http://`/`https://` nem barra final
    pub fn bare_domain(&self) -> &str {
        let domain = self.domain.trim();
        let domain = domain
            .strip_prefix("https://")
            .or_else(|| domain.strip_prefix("http://"))
            .unwrap_or(domain);
        domain.trim_end_matches('/')
    }

    pub fn api_base_url(&self) -> String {
        format!("https://{}", self.bare_domain())
    }
}

/// Variáveis "planas" do ambiente mapeadas para chaves de configuração
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("GOOGLE_SHEET_ID", "google_sheets.spreadsheet_id"),
    ("GOOGLE_CREDENTIALS_PATH", "google_sheets.credentials_path"),
    ("AMOCRM_DOMAIN", "amocrm.domain"),
    ("AMOCRM_CLIENT_ID", "amocrm.client_id"),
    ("AMOCRM_CLIENT_SECRET", "amocrm.client_secret"),
    ("AMOCRM_REDIRECT_URI", "amocrm.redirect_uri"),
    ("AMOCRM_SUCCESS_STATUS_ID", "amocrm.success_status_id"),
    ("AMOCRM_PIPELINE_ID", "amocrm.pipeline_id"),
    ("AMOCRM_TOKEN_FILE", "amocrm.token_file"),
    ("SYNC_CURSOR_FILE", "sync.cursor_file"),
];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("amocrm.oauth_base_url", "https://www.amocrm.ru")?
            .set_default("amocrm.token_file", "token.json")?
            .set_default("amocrm.request_delay_ms", 500)?
            .set_default("google_sheets.sheet_name", "Лист1")?
            .set_default("google_sheets.api_base_url", "https://sheets.googleapis.com")?
            .set_default("sync.enabled", true)?
            .set_default("sync.interval_seconds", 5)?
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("AMO_SHEETS").separator("__"));

        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let s = builder.build()?;

        s.try_deserialize()
    }

    /// Validação antecipada: todos os problemas são reportados juntos
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        let required = [
            ("google_sheets.spreadsheet_id", &self.google_sheets.spreadsheet_id),
            ("google_sheets.credentials_path", &self.google_sheets.credentials_path),
            ("google_sheets.sheet_name", &self.google_sheets.sheet_name),
            ("amocrm.client_id", &self.amocrm.client_id),
            ("amocrm.client_secret", &self.amocrm.client_secret),
            ("amocrm.token_file", &self.amocrm.token_file),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{}: não pode ser vazio", key));
            }
        }

        if self.amocrm.bare_domain().is_empty() {
            problems.push("amocrm.domain: não pode ser vazio".to_string());
        }

        match url::Url::parse(&self.amocrm.redirect_uri) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(_) => problems.push("amocrm.redirect_uri: esquema deve ser http ou https".to_string()),
            Err(e) => problems.push(format!("amocrm.redirect_uri: URL inválida ({})", e)),
        }

        if self.amocrm.success_status_id <= 0 {
            problems.push("amocrm.success_status_id: deve ser positivo".to_string());
        }
        if self.amocrm.pipeline_id <= 0 {
            problems.push("amocrm.pipeline_id: deve ser positivo".to_string());
        }
        if self.server.port == 0 {
            problems.push("server.port: deve ser positivo".to_string());
        }
        if self.sync.interval_seconds == 0 {
            problems.push("sync.interval_seconds: deve ser positivo".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_settings() -> Settings {
        Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3002,
            },
            amocrm: AmoCrmSettings {
                domain: "https://empresa.amocrm.ru/".to_string(),
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: "https://example.com/oauth/callback".to_string(),
                oauth_base_url: "https://www.amocrm.ru".to_string(),
                success_status_id: 142,
                pipeline_id: 7,
                token_file: "token.json".to_string(),
                request_delay_ms: 500,
            },
            google_sheets: GoogleSheetsSettings {
                spreadsheet_id: "sheet-id".to_string(),
                credentials_path: "credentials.json".to_string(),
                sheet_name: "Лист1".to_string(),
                api_base_url: "https://sheets.googleapis.com".to_string(),
            },
            sync: SyncSettings {
                enabled: true,
                interval_seconds: 5,
                cursor_file: None,
            },
        }
    }

    #[test]
    fn test_bare_domain_strips_scheme() {
        let settings = sample_settings();
        assert_eq!(settings.amocrm.bare_domain(), "empresa.amocrm.ru");
        assert_eq!(settings.amocrm.api_base_url(), "https://empresa.amocrm.ru");
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_settings().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let mut settings = sample_settings();
        settings.amocrm.client_id = "".to_string();
        settings.amocrm.redirect_uri = "not a url".to_string();
        settings.amocrm.pipeline_id = 0;
        settings.sync.interval_seconds = 0;

        let problems = settings.validate().unwrap_err();
        assert_eq!(problems.len(), 4);
        assert!(problems.iter().any(|p| p.starts_with("amocrm.client_id")));
        assert!(problems.iter().any(|p| p.starts_with("amocrm.redirect_uri")));
    }
}
