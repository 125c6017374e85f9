//! # Retry / Quota Guard
//!
//! Every backend list/write call passes through [`QuotaGuard::run`], which
//! classifies failures:
//!
//! | backend failure | outcome |
//! |---|---|
//! | permission denied | [`SyncError::Permission`], no retry |
//! | quota / rate limit | one cooldown, one retry; a second quota failure is [`SyncError::QuotaExceeded`] |
//! | not found | [`SyncError::NotFound`], no retry |
//! | anything else | [`SyncError::Transport`] (or `Io`) unchanged |
//!
//! The cooldown is interruptible: cancelling the session's shutdown token
//! ends the wait with [`SyncError::Cancelled`].

use crate::error::{Result, SyncError};
use bridge_traits::error::Result as BridgeResult;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Failure classifier wrapped around backend calls
#[derive(Debug, Clone)]
pub struct QuotaGuard {
    cooldown: Duration,
    shutdown: CancellationToken,
}

impl QuotaGuard {
    pub fn new(cooldown: Duration, shutdown: CancellationToken) -> Self {
        Self { cooldown, shutdown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Runs `call`, retrying it once after the cooldown if the backend reports
    /// a quota/rate-limit failure.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        match call().await {
            Ok(value) => Ok(value),
            Err(err) if err.is_quota() => {
                warn!(
                    operation,
                    cooldown_secs = self.cooldown.as_secs_f64(),
                    error = %err,
                    "Quota exceeded, injecting cooldown before retrying once"
                );
                self.cool_down().await?;

                match call().await {
                    Ok(value) => {
                        info!(operation, "Backend call succeeded after quota cooldown");
                        Ok(value)
                    }
                    Err(err) if err.is_quota() => {
                        warn!(operation, "Quota still exceeded after cooldown, giving up this pass");
                        Err(SyncError::QuotaExceeded {
                            operation: operation.to_string(),
                        })
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => {
                debug!(operation, error = %err, "Backend call failed");
                Err(err.into())
            }
        }
    }

    async fn cool_down(&self) -> Result<()> {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("Quota cooldown interrupted by shutdown");
                Err(SyncError::Cancelled)
            }
            _ = tokio::time::sleep(self.cooldown) => Ok(()),
        }
    }
}
