use std::{future::Future, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};

use super::AuthError;

/// Awaits `call`, failing with `DeadlineExceeded` once `timeout` elapses.
/// `None` waits indefinitely.
pub(crate) async fn bounded<T, E, F>(timeout: Option<StdDuration>, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, E>>,
    AuthError: From<E>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::DeadlineExceeded),
        },
        None => call.await.map_err(AuthError::from),
    }
}

/// `now + ttl`, or `TtlOutOfRange` when the sum leaves chrono's range.
pub(crate) fn expires_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    now.checked_add_signed(ttl)
        .ok_or(AuthError::TtlOutOfRange(ttl.num_seconds()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};

    use super::{bounded, expires_after};
    use crate::auth::{AuthError, StoreError};

    #[tokio::test]
    async fn stalled_call_hits_the_deadline() {
        let stalled = async {
            tokio::time::sleep(StdDuration::from_secs(30)).await;
            Ok::<_, StoreError>(())
        };

        let err = bounded(Some(StdDuration::from_millis(10)), stalled)
            .await
            .expect_err("call should time out");

        assert!(matches!(err, AuthError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn store_errors_pass_through() {
        let failing = async { Err::<(), _>(StoreError::Backend("down".into())) };

        let err = bounded(None, failing).await.expect_err("call should fail");

        assert!(matches!(err, AuthError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn overflowing_lifetime_is_an_error() {
        let now = Utc::now();

        assert_eq!(
            expires_after(now, Duration::minutes(1)).expect("in range"),
            now + Duration::minutes(1)
        );
        let err = expires_after(now, Duration::MAX).expect_err("should overflow");
        assert!(matches!(err, AuthError::TtlOutOfRange(_)));
    }
}
