//! Resumable polling
//!
//! The poller never retries on its own. This wrapper restarts it from the
//! last adopted cursor when a fetch fails with a transient error, backing
//! off between attempts.

use sluice_core::{BatchSource, ContinueSignal, Cursor, CursorPoller, PollError, TerminationReason};
use std::fmt::Display;
use tracing::{info, warn};

use crate::config::RetryPolicy;

/// Poll `source` to completion, resuming after retryable fetch errors
///
/// Each resumption uses a fresh [`CursorPoller`] seeded with the cursor the
/// failed run reported, so no item is delivered twice or skipped (as far as
/// the source's own cursor semantics allow).
///
/// Returns the final termination reason. A `SourceError` is only returned
/// once the error is not retryable or the retries are used up.
pub fn poll_with_resume<S, C, R>(
    source: &mut S,
    batch_size: usize,
    start: Option<Cursor>,
    policy: &RetryPolicy,
    is_retryable: R,
    mut on_item: C,
) -> Result<TerminationReason<S::Error>, PollError>
where
    S: BatchSource,
    S::Error: Display,
    C: FnMut(S::Item) -> ContinueSignal,
    R: Fn(&S::Error) -> bool,
{
    let mut cursor = start;
    let mut attempt = 0;

    loop {
        let outcome = CursorPoller::new(batch_size)?
            .with_initial_cursor(cursor)
            .poll(source, &mut on_item)?;

        match outcome {
            TerminationReason::SourceError { error, cursor: resume }
                if attempt < policy.max_retries && is_retryable(&error) =>
            {
                attempt += 1;
                let delay = policy.delay_for(attempt);

                warn!(
                    "Fetch failed (attempt {}/{}): {}",
                    attempt, policy.max_retries, error
                );
                warn!("Resuming in {:?}...", delay);

                std::thread::sleep(delay);
                cursor = resume;
            }
            other => {
                if attempt > 0 && !other.is_error() {
                    info!("Polling completed after {} resumption(s)", attempt);
                }
                return Ok(other);
            }
        }
    }
}
