//! Shared state between handlers.

use ::std::sync::Arc;

use ::sparkgw_common::ledger::Ledger;

use crate::orchestrator::Orchestrator;

pub(crate) struct AppState<L> {
    orchestrator: Arc<Orchestrator<L>>,
    default_log_lines: i64,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            default_log_lines: self.default_log_lines,
        }
    }
}

impl<L: Ledger> AppState<L> {
    pub(crate) fn new(orchestrator: Orchestrator<L>, default_log_lines: i64) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            default_log_lines,
        }
    }

    pub(crate) fn orchestrator(&self) -> &Orchestrator<L> {
        &self.orchestrator
    }

    pub(crate) fn default_log_lines(&self) -> i64 {
        self.default_log_lines
    }
}
