use thiserror::Error;

/// Erros do ciclo de vida do token OAuth2 do amoCRM
#[derive(Error, Debug)]
pub enum AuthError {
    /// Troca do authorization code rejeitada pelo endpoint de token
    #[error("Failed to get token: {0}")]
    AuthExchangeFailed(String),

    #[error("No refresh token available. Please re-authenticate.")]
    NoRefreshToken,

    #[error("Failed to refresh token: {0}")]
    RefreshFailed(String),

    /// Refresh concluído mas sem access token utilizável
    #[error("Failed to obtain valid access token")]
    TokenUnavailable,

    #[error("Erro de rede: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Erro de IO no armazenamento do token: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = AuthError::AuthExchangeFailed("Bad Request".to_string());
        assert_eq!(err.to_string(), "Failed to get token: Bad Request");

        let err = AuthError::RefreshFailed("Unauthorized".to_string());
        assert_eq!(err.to_string(), "Failed to refresh token: Unauthorized");

        assert_eq!(
            AuthError::NoRefreshToken.to_string(),
            "No refresh token available. Please re-authenticate."
        );
        assert_eq!(AuthError::TokenUnavailable.to_string(), "Failed to obtain valid access token");
    }

    #[test]
    fn test_io_error_from() {
        use std::io::{Error, ErrorKind};
        let err = AuthError::from(Error::new(ErrorKind::PermissionDenied, "read-only"));
        assert!(matches!(err, AuthError::StorageError(_)));
    }
}
