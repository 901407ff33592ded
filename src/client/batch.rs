//! Bounded-concurrency batch authentication: many credentials, a capped
//! number of in-flight pipeline runs, one result per credential regardless
//! of whether others in the batch failed.

use crate::client::facade::AuthClient;
use crate::model::result::AuthenticationResult;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Tuning knobs for [`AuthClient`]'s batch entry point, via
/// `client::batch::authenticate_batch`.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum number of pipeline runs in flight at once.
    pub max_concurrency: usize,
    /// Per-credential timeout.
    pub timeout_ms: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            timeout_ms: 5000,
        }
    }
}

/// One credential's outcome within a batch.
#[derive(Debug, Clone)]
pub enum BatchResult {
    /// The pipeline ran to completion (success or a classified failure).
    Completed(AuthenticationResult),
    /// The pipeline did not finish within `timeout_ms`.
    TimedOut,
    /// The pipeline returned an unclassified error (e.g. a directory outage
    /// that survived the single retry).
    Error(String),
}

/// Authenticate every `(username, password)` pair in `credentials`, with at
/// most `options.max_concurrency` pipeline runs in flight at once. A
/// failure or timeout for one credential never aborts the others.
pub async fn authenticate_batch(
    client: &AuthClient,
    credentials: Vec<(String, Vec<u8>)>,
    options: &BatchOptions,
) -> HashMap<String, BatchResult> {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
    let timeout = Duration::from_millis(options.timeout_ms);

    let mut handles = Vec::with_capacity(credentials.len());
    for (username, password) in credentials {
        let client = client.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed while handles are outstanding");
            let result = tokio::time::timeout(
                timeout,
                client.authenticate_async(&username, password),
            )
            .await;
            let outcome = match result {
                Ok(Ok(auth_result)) => BatchResult::Completed(auth_result),
                Ok(Err(e)) => BatchResult::Error(e.to_string()),
                Err(_) => BatchResult::TimedOut,
            };
            (username, outcome)
        }));
    }

    let mut results = HashMap::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((username, outcome)) => {
                results.insert(username, outcome);
            }
            Err(join_err) => {
                log::error!("batch authentication task panicked: {join_err}");
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_policy() {
        let opts = BatchOptions::default();
        assert_eq!(opts.max_concurrency, 10);
        assert_eq!(opts.timeout_ms, 5000);
    }
}
