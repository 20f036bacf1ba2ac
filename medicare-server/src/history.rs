use medicare_core::HistoryRecord;
use medicare_store::HistoryLog;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Record a mutation. The append runs in a spawned task; failures are only logged.
pub fn record(history: &Arc<Mutex<HistoryLog>>, record: HistoryRecord) {
    tracing::info!(
        route = %record.route,
        subroute = %record.subroute,
        action = %record.action,
        actor = record.actor.get("id").and_then(|v| v.as_str()).unwrap_or("anonymous"),
        "History: {}",
        record.summary
    );

    let history = Arc::clone(history);
    tokio::spawn(async move {
        let log = history.lock().await;
        if let Err(e) = log.append(&record) {
            tracing::error!(
                route = %record.route,
                action = %record.action,
                "Failed to write history record: {}",
                e
            );
        }
    });
}
