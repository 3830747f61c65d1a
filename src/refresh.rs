use crate::fleet::snapshots;
use crate::reconciler::ReconcileReport;
use crate::state::AppState;
use std::sync::Arc;
use tracing::info;

/// One reconciliation pass against the current fleet tables.
pub async fn reconcile_once(state: &AppState) -> ReconcileReport {
    // Read the revision first: a write landing after it will trigger another pass.
    let revision = state.revision();
    let snapshots = snapshots(state);
    let mut map = state.live_map.lock().await;
    map.refresh(&snapshots, revision)
}

/// Reconciles once at start, then once per observed revision bump. Bumps
/// that land mid-pass collapse into a single follow-up pass.
pub async fn run(state: Arc<AppState>) {
    let mut changes = state.subscribe();
    reconcile_once(&state).await;
    info!("live map reconciler started");

    while changes.changed().await.is_ok() {
        reconcile_once(&state).await;
    }
}
