//! Metrics emitted through the `metrics` facade
//!
//! No recorder is installed here; the host decides where metrics go.

use std::time::Duration;

use metrics::{counter, histogram};

/// Parameters for ingestion metrics
pub struct IngestionMetricParams<'a> {
    pub knowledge_base_id: &'a str,
    pub strategy: &'a str,
    pub duration: Duration,
    /// Stage that failed, if any
    pub failed_stage: Option<&'a str>,
    pub chunk_count: usize,
    pub embedded_count: usize,
}

/// Record one import attempt
pub fn record_ingestion(params: IngestionMetricParams) {
    let status = if params.failed_stage.is_some() {
        "error"
    } else {
        "success"
    };
    let labels = [
        ("knowledge_base", params.knowledge_base_id.to_string()),
        ("strategy", params.strategy.to_string()),
        ("status", status.to_string()),
    ];

    counter!("knowledge_ingestions_total", &labels).increment(1);
    histogram!("knowledge_ingestion_duration_seconds", &labels)
        .record(params.duration.as_secs_f64());

    if let Some(stage) = params.failed_stage {
        counter!(
            "knowledge_ingestion_errors_total",
            "knowledge_base" => params.knowledge_base_id.to_string(),
            "stage" => stage.to_string()
        )
        .increment(1);
        return;
    }

    counter!("knowledge_chunks_created_total", &labels).increment(params.chunk_count as u64);
    counter!("knowledge_embeddings_created_total", &labels)
        .increment(params.embedded_count as u64);
}

/// Record one search call
pub fn record_search(mode: &str, duration: Duration, success: bool, result_count: usize) {
    let labels = [
        ("mode", mode.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("knowledge_searches_total", &labels).increment(1);
    histogram!("knowledge_search_duration_seconds", &labels).record(duration.as_secs_f64());
    histogram!("knowledge_search_results", &labels).record(result_count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        record_ingestion(IngestionMetricParams {
            knowledge_base_id: "kb",
            strategy: "recursive",
            duration: Duration::from_millis(5),
            failed_stage: None,
            chunk_count: 3,
            embedded_count: 3,
        });
        record_ingestion(IngestionMetricParams {
            knowledge_base_id: "kb",
            strategy: "semantic",
            duration: Duration::from_millis(1),
            failed_stage: Some("split"),
            chunk_count: 0,
            embedded_count: 0,
        });
        record_search("hybrid", Duration::from_millis(2), true, 4);
    }
}
