//! Time budgets and cancellation checks shared by every stage.

use std::future::Future;
use std::time::Duration;

use reasonchain_core::error::{Error, Stage};
use tokio_util::sync::CancellationToken;

/// Await `fut`, giving up after `limit` if one is set.
///
/// On expiry `on_timeout` receives the budget in milliseconds and builds the
/// caller's timeout error.
pub async fn with_timeout<T, E, F>(
    limit: Option<Duration>,
    fut: F,
    on_timeout: impl FnOnce(u64) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };

    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit.as_millis() as u64)),
    }
}

/// Fail with `Error::Cancelled` if the token exists and has fired.
pub fn check_cancelled(token: Option<&CancellationToken>, next: Stage) -> Result<(), Error> {
    if let Some(token) = token
        && token.is_cancelled()
    {
        return Err(Error::Cancelled { before: next });
    }
    Ok(())
}
