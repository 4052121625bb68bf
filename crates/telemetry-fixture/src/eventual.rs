//! Polling with exponential backoff for cluster state that converges later.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Initial delay between polls.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Longest delay between two polls.
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Outcome of a single poll.
#[derive(Debug)]
pub enum Poll<T, E> {
    /// Condition met; stop polling.
    Ready(T),
    /// Not yet; `E` describes why and is reported if the deadline passes.
    Pending(E),
    /// Unrecoverable; stop polling immediately.
    Failed(E),
}

/// Why polling stopped without a `Ready` value.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
    /// Deadline passed; carries the last pending reason.
    TimedOut(E),
    Failed(E),
}

/// Poll `op` until it is ready, fails, or `timeout` elapses.
///
/// Backoff doubles from `initial_delay`, capped at 5s and at the time left
/// before the deadline. `op` always runs at least once.
pub async fn poll_until<T, E, F, Fut>(
    timeout: Duration,
    initial_delay: Duration,
    mut op: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Poll<T, E>>,
{
    let mut delay = initial_delay;
    let start = Instant::now();

    loop {
        let pending = match op().await {
            Poll::Ready(value) => return Ok(value),
            Poll::Failed(e) => return Err(PollError::Failed(e)),
            Poll::Pending(e) => e,
        };

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(PollError::TimedOut(pending));
        }

        let remaining = timeout.saturating_sub(elapsed);
        sleep(delay.min(remaining)).await;

        delay = (delay * 2).min(MAX_DELAY);
    }
}
