/// Utilitários de string para logs (tokens, códigos OAuth, corpos de resposta)

/// Trunca `s` em no máximo `max_bytes` sem cortar um caractere UTF-8 no meio.
///
/// # Exemplo
/// ```
/// use amocrm_sheets_sync::utils::string_utils::truncate_safe;
///
/// assert_eq!(truncate_safe("Лист1", 4), "Ли");
/// ```
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Trunca e adiciona `suffix` apenas quando algo foi cortado
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    let truncated = truncate_safe(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{}{}", truncated, suffix)
    } else {
        truncated.to_string()
    }
}

/// Formato seguro para logar credenciais: prefixo curto + tamanho total
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<vazio>".to_string();
    }
    format!("{}... ({} bytes)", truncate_safe(secret, 8), secret.len())
}

/// Texto de status HTTP como o `statusText` dos clientes web ("Too Many Requests")
pub fn status_text(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
