//! OAuth2 Configuration
//!
//! Credenciais da integração amoCRM e URLs do fluxo OAuth2

use serde::{Deserialize, Serialize};

use crate::config::AmoCrmSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// ID da integração no amoCRM
    pub client_id: String,

    pub client_secret: String,

    /// URL de callback registrada na integração
    pub redirect_uri: String,

    /// Base das URLs OAuth2, normalmente `https://www.amocrm.ru`
    pub oauth_base_url: String,
}

impl OAuth2Config {
    pub fn from_settings(settings: &AmoCrmSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            oauth_base_url: settings.oauth_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint de troca/refresh de token
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/access_token", self.oauth_base_url)
    }

    /// Página de autorização para onde o usuário é redirecionado
    pub fn authorization_url(&self) -> String {
        format!(
            "{}/oauth?client_id={}&redirect_uri={}&response_type=code",
            self.oauth_base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri)
        )
    }
}
