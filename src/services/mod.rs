pub mod amocrm;
pub mod google_sheets;

pub use amocrm::{
    AmoCrmClient, ContactRecord, CrmError, CrmResult, LeadBudgetUpdater, UserRecord,
};
pub use google_sheets::{
    AccessTokenProvider, GoogleSheetsService, ServiceAccountAuth, SheetRowSource, SheetsError,
    SheetsResult, StaticToken,
};
