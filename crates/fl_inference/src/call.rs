use std::future::Future;
use std::time::Duration;

use fl_core::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Runs one remote call under an optional deadline, giving up early if the
/// run is cancelled.
pub(crate) async fn guarded<T, F>(
    label: &str,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(format!("{} after {:?}", label, limit)))?,
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = bounded => result,
    }
}
