//! A small extension trait for attaching a timeout to any future.
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::Timeout;

/// Extension trait adding [`with_timeout`](FutureExt::with_timeout) to every future.
pub trait FutureExt: Future + Sized {
    /// Wraps this future so that it resolves to `Err(Elapsed)` if `duration`
    /// passes before it completes.
    ///
    /// This is a thin wrapper around [`tokio::time::timeout`], kept as a
    /// method so call sites read `fut.with_timeout(dur).await` left-to-right
    /// instead of wrapping the future in a free function.
    fn with_timeout(self, duration: Duration) -> Timeout<Self> {
        tokio::time::timeout(duration, self)
    }
}

impl<F: Future> FutureExt for F {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completes_within_timeout() {
        let result = async { 7 }.with_timeout(Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn elapses_when_future_is_too_slow() {
        let result = std::future::pending::<()>()
            .with_timeout(Duration::from_millis(10))
            .await;
        assert!(result.is_err());
    }
}
