use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::credential::{Credential, CredentialPool};
use crate::errors::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub interval: Duration,
    /// Rotate to the next credential after a failure.
    pub switch_credential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: Duration::from_millis(1000),
            switch_credential: true,
        }
    }
}

/// Inputs for one attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub credential: Credential,
    pub project: String,
    pub number: u32,
}

/// Runs `attempt` until it succeeds or `max_retries + 1` attempts have failed.
///
/// The first attempt uses `pool.pick()`. A failed credential resolution
/// counts as a failed attempt. The error of the final attempt is returned.
pub async fn execute<T, F, Fut>(
    pool: &CredentialPool,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, UpstreamError>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut credential = pool.pick();
    let mut number = 0u32;
    loop {
        let outcome = match pool.resolve(&credential).await {
            Ok(project) => {
                attempt(Attempt {
                    credential: credential.clone(),
                    project,
                    number,
                })
                .await
            }
            Err(err) => Err(err.into()),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        warn!(
            event = "upstream_attempt_failed",
            attempt = number,
            credential_index = credential.index(),
            error = %err
        );
        if number >= policy.max_retries {
            return Err(err);
        }

        number += 1;
        tokio::time::sleep(policy.interval).await;
        if policy.switch_credential && pool.count() > 1 {
            credential = pool.pick_at(pool.next(credential.index()));
        }
    }
}
