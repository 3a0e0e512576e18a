//! Running blocking wallet calls from async code

use crate::{Error, Result};

/// Run a blocking wallet operation on tokio's blocking pool.
///
/// ```rust,ignore
/// let receipt = run_blocking(move || wallet.send_transaction(chain, calls)).await?;
/// ```
pub async fn run_blocking<F, R>(operation: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
}
