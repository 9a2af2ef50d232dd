pub mod scheduler;
pub mod sync_budget;

pub use scheduler::SyncScheduler;
pub use sync_budget::{BudgetSyncJob, CursorFile, SyncError, TickReport};
