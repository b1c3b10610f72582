//! Scoped foreign-key check suspension.
//!
//! Re-enabling the checks is an async round trip, so it cannot live in a
//! `Drop` impl. Instead the guarded work runs as a future: the flag is
//! restored after it resolves, returns an error or panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::core::traits::TargetStore;
use crate::error::Result;

/// Run `work` with foreign-key checks disabled on `target`.
///
/// Checks are re-enabled on every exit path. A panic inside `work` is
/// resumed after the flag has been restored. When `work` fails and
/// restoring also fails, the work's error is returned.
pub async fn with_foreign_key_checks_disabled<F, T>(target: &dyn TargetStore, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    target.set_foreign_key_checks(false).await?;
    debug!("Foreign key checks disabled");

    let outcome = AssertUnwindSafe(work).catch_unwind().await;

    let restored = target.set_foreign_key_checks(true).await;
    match &restored {
        Ok(()) => debug!("Foreign key checks re-enabled"),
        Err(e) => warn!("Failed to re-enable foreign key checks: {}", e),
    }

    match outcome {
        Ok(Ok(value)) => restored.map(|_| value),
        Ok(Err(e)) => Err(e),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
