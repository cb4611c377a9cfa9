pub mod action;
pub mod context;
pub mod history;
pub mod records;
pub mod status;

pub use action::{Action, ExecutionResult};
pub use context::{FinanceSignals, HealthSignals, ScheduleSignals, UserContext};
pub use history::HistoryEntry;
pub use records::{Project, ProjectStatus, Task, User};
pub use status::{DegradeReason, StatusOutcome, StatusResult, FALLBACK_INSIGHT};
