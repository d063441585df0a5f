use std::sync::Arc;
use std::time::Instant;

use crate::audit::AuditLogStore;
use crate::config::Settings;
use crate::notification::{NotificationDispatcher, RetryCoordinator};
use crate::postgres::PostgresPool;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn AuditLogStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub retry: Arc<RetryCoordinator>,
    /// Present only when the Postgres store is in use
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        dispatcher: Arc<NotificationDispatcher>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        let store = dispatcher.store().clone();
        let retry = Arc::new(RetryCoordinator::new(dispatcher.clone()));

        Self {
            settings: Arc::new(settings),
            store,
            dispatcher,
            retry,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
