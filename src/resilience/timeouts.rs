//! Whole-call deadlines.
//!
//! A deadline wraps an entire dispatch from the outside. It never interrupts a
//! provider attempt: the dispatch keeps running on its own task and the
//! caller simply stops waiting for it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline passed before the wrapped call completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {}ms elapsed", .0.as_millis())]
pub struct DeadlineElapsed(pub Duration);

/// Wait for `fut` for at most `deadline`.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, DeadlineElapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| DeadlineElapsed(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_deadline() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let result = with_deadline(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert_eq!(result, Err(DeadlineElapsed(Duration::from_millis(100))));
        assert_eq!(
            result.unwrap_err().to_string(),
            "deadline of 100ms elapsed"
        );
    }
}
