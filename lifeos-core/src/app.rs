use std::sync::Arc;

use crate::aggregator::StatusAggregator;
use crate::config::LifeOsConfig;
use crate::context::ContextStore;
use crate::error::LifeOsError;
use crate::executor::{ActionExecutor, JournalSink};
use crate::gemini::GeminiClient;
use crate::history::HistoryLog;
use crate::retry::{RetryPolicy, RetryingHttpClient};
use crate::store::DemoStore;

/// Everything a request handler needs, built once at startup.
pub struct LifeOs {
    pub config: LifeOsConfig,
    pub aggregator: StatusAggregator,
    pub executor: ActionExecutor,
    pub journal: Arc<JournalSink>,
    pub context: Arc<ContextStore>,
    pub history: Arc<HistoryLog>,
    pub store: Arc<DemoStore>,
}

impl LifeOs {
    pub fn from_config(config: LifeOsConfig) -> Result<Self, LifeOsError> {
        let policy = RetryPolicy::from_config(&config.upstream.retry);
        let http = RetryingHttpClient::new(policy)?;
        let upstream = GeminiClient::new(http, &config.upstream);

        if !upstream.is_configured() {
            tracing::warn!(
                "No Gemini API key configured; status queries will return the fallback payload"
            );
        }

        let context = Arc::new(ContextStore::new());
        let history = Arc::new(HistoryLog::new(config.history.capacity));
        let journal = Arc::new(JournalSink::new(config.executor.journal_capacity));

        Ok(Self {
            aggregator: StatusAggregator::new(upstream, context.clone(), history.clone()),
            executor: ActionExecutor::new(journal.clone()),
            journal,
            context,
            history,
            store: Arc::new(DemoStore::seeded()),
            config,
        })
    }
}
