pub mod budget_row;
pub mod lead_row;
pub mod webhook;

pub use budget_row::{budget_update, BudgetUpdate};
pub use lead_row::LeadRow;
pub use webhook::{LeadChange, LeadEvent, LeadsWebhook};
