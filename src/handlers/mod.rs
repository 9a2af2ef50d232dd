pub mod health;
pub mod webhook;

pub use health::health_check;
pub use webhook::handle_amocrm_webhook;

// OAuth2 handlers ficam em src/auth/handlers.rs
