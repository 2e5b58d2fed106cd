use crate::server::ledger::OrderLedger;
use crate::server::orchestrator::RoomTicketOrchestrator;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    orchestrator: Arc<RoomTicketOrchestrator>,
    ledger: Arc<dyn OrderLedger>,
}

impl AppState {
    pub fn new(orchestrator: Arc<RoomTicketOrchestrator>, ledger: Arc<dyn OrderLedger>) -> Self {
        Self {
            orchestrator,
            ledger,
        }
    }

    pub fn get_orchestrator(&self) -> &RoomTicketOrchestrator {
        self.orchestrator.as_ref()
    }

    pub fn get_ledger(&self) -> &dyn OrderLedger {
        self.ledger.as_ref()
    }
}
