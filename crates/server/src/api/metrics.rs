//! Prometheus metrics recording and background collection.

use metrics::{counter, gauge, histogram};
use multivec_core::index::IndexMode;
use multivec_core::storage::Database;
use std::time::Duration;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records a write operation metric.
pub fn record_write_operation(collection: &str, operation: &str) {
    counter!(
        "multivec_operations_total",
        "collection" => collection.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Records a search operation metric.
pub fn record_search_operation(collection: &str, vector_space: &str) {
    counter!(
        "multivec_search_total",
        "collection" => collection.to_string(),
        "vector_space" => vector_space.to_string()
    )
    .increment(1);
}

/// Updates collection-level Prometheus gauges.
pub fn update_collection_metrics(db: &Database) {
    let names = db.list_collections();
    gauge!("multivec_collections_total").set(names.len() as f64);
    for name in names {
        let Some(collection) = db.get_collection(&name) else {
            continue;
        };
        let info = collection.info();
        let states = collection.segment_states();
        let labels = [("collection", name)];
        gauge!("multivec_points_total", &labels).set(info.points_count as f64);
        gauge!("multivec_indexed_vectors_total", &labels).set(info.indexed_vectors_count as f64);
        gauge!("multivec_graph_indexes", &labels)
            .set(states.iter().filter(|s| s.mode == IndexMode::Graph).count() as f64);
        gauge!("multivec_degraded_indexes", &labels)
            .set(states.iter().filter(|s| s.degraded.is_some()).count() as f64);
    }
}
