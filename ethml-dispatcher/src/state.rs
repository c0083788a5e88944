//! Shared application state handed to every axum handler

use std::sync::Arc;

use crate::ledger::Ledger;
use crate::repository::TaskStore;
use crate::service::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn TaskStore>,
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn TaskStore>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            dispatcher,
            store,
            ledger,
        }
    }
}
