pub mod settings;

pub use settings::{AmoCrmSettings, GoogleSheetsSettings, ServerSettings, Settings, SyncSettings};
