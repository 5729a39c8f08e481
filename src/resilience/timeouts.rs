//! Timeout enforcement for external collaborator calls.
//!
//! # Design Decisions
//! - Every shared-store call runs under a caller-supplied deadline
//! - Timeout errors are distinct from other errors
//! - Dropping the wrapped future cancels the pending call

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Run `fut` with a deadline, converting an elapsed deadline into `E`.
pub async fn call_with_timeout<T, E, F>(deadline: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Elapsed>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(E::from(elapsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Timeout,
    }

    impl From<Elapsed> for TestError {
        fn from(_: Elapsed) -> Self {
            TestError::Timeout
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let result: Result<(), TestError> = call_with_timeout(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(TestError::Timeout)));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result: Result<u32, TestError> =
            call_with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
