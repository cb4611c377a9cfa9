pub mod aggregator;
pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod history;
pub mod models;
pub mod retry;
pub mod store;

pub use aggregator::{status_response_schema, StatusAggregator, SYSTEM_INSTRUCTION};
pub use app::LifeOs;
pub use config::LifeOsConfig;
pub use context::ContextStore;
pub use error::LifeOsError;
pub use executor::{ActionExecutor, ActionSink, ExecutionError, JournalSink};
pub use gemini::{decode_structured, GeminiClient, GenerateContentRequest, UpstreamError};
pub use history::HistoryLog;
pub use models::{Action, ExecutionResult, StatusOutcome, StatusResult, UserContext};
pub use retry::{HttpError, RequestSpec, RetryPolicy, RetryingHttpClient};
pub use store::{DemoStore, StoreError};
