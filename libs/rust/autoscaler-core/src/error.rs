//! Error taxonomy for the gateway clients (spec.md §7).

use thiserror::Error;

/// Failure fetching or decoding data from an external gateway.
///
/// Every caller treats `TransientFetchError`-shaped failures as "unavailable
/// this tick" — they are logged and skipped, never propagated to abort the
/// control loop (spec.md §7).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to {target} failed: {source}")]
    TransientFetch {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {target}: {source}")]
    Decode {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("orchestrator rejected mutation for {app} with status {status}")]
    MutationRejected { app: String, status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_rejected_message_names_app_and_status() {
        let err = GatewayError::MutationRejected { app: "web".to_string(), status: 409 };
        assert_eq!(err.to_string(), "orchestrator rejected mutation for web with status 409");
    }
}
