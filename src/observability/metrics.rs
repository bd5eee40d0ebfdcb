//! Metrics collection.
//!
//! # Metrics
//! - `chain_rpc_requests_total` (counter): JSON-RPC requests by method and outcome
//! - `chain_operations_total` (counter): public operations by name and outcome
//!
//! Recording is a no-op until the embedding process installs a recorder.

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record one JSON-RPC request.
pub fn record_rpc_call(method: &'static str, success: bool) {
    metrics::counter!(
        "chain_rpc_requests_total",
        "method" => method,
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Record one public operation at the normalization boundary.
pub fn record_operation(operation: &'static str, success: bool) {
    metrics::counter!(
        "chain_operations_total",
        "operation" => operation,
        "outcome" => outcome(success)
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_rpc_call("eth_chainId", true);
        record_operation("get balance", false);
        assert_eq!(outcome(true), "success");
        assert_eq!(outcome(false), "error");
    }
}
