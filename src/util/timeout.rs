//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ShimError;

/// Run `future` with a deadline; expiry is [`ShimError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ShimError>>,
) -> Result<T, ShimError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ShimError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_reports_the_bound() {
        let result: Result<(), _> = with_timeout(Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ShimError::Timeout(250))));
    }

    #[tokio::test]
    async fn passes_through_inner_result() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, ShimError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
