use std::sync::Arc;

use crate::config::Config;
use crate::points::costs::DynCostProvider;
use crate::points::store::DynLedgerStore;
use crate::search::orchestrator::SearchOrchestrator;
use crate::session::DynSessionProvider;

/// Shared application state injected into all route handlers via Axum extractors.
/// Collaborators are trait objects so tests and deployments can swap backends
/// without touching handler code.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// End-to-end search flow: cache → guard → gate → upstream → cache write.
    pub orchestrator: Arc<SearchOrchestrator>,
    /// Atomic points ledger; the only path that mutates balances.
    pub ledger: DynLedgerStore,
    pub costs: DynCostProvider,
    pub sessions: DynSessionProvider,
}
