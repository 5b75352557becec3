use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::{ScraperError, ScraperResult};

/// Runs `work` for at most `limit`, then awaits `release` no matter how the
/// work ended. A timeout becomes a `RenderError` naming `what`.
#[cfg_attr(not(feature = "render"), allow(dead_code))]
pub(crate) async fn run_then_release<T, W, R>(
    limit: Duration,
    what: &str,
    work: W,
    release: R,
) -> ScraperResult<T>
where
    W: Future<Output = ScraperResult<T>>,
    R: Future<Output = ()>,
{
    let outcome = timeout(limit, work).await;
    release.await;
    outcome.map_err(|_| {
        ScraperError::RenderError(format!("{} timed out after {:?}", what, limit))
    })?
}
