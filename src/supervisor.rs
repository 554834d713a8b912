// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Supervision of the long-running units
//!
//! The watcher and the dispatcher run as independently scheduled tasks.
//! The harness blocks until the external shutdown future resolves or any
//! unit terminates; either way the shared cancellation token fires and the
//! remaining units get a bounded grace window to drain before being
//! aborted. A long-running unit terminating at all is a failure: even an
//! `Ok` return is surfaced as an error naming the unit, and panics are
//! captured through the join handle rather than crashing invisibly.

use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct Supervisor {
    cancel: CancellationToken,
    units: JoinSet<(&'static str, Result<()>)>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self { cancel: CancellationToken::new(), units: JoinSet::new() }
    }

    /// Token to pass into units; checked at their suspension points.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn spawn<F>(&mut self, name: &'static str, unit: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.units.spawn(async move { (name, unit.await) });
    }

    /// Run until `shutdown` resolves (graceful, returns Ok) or any unit
    /// terminates (always an error for a long-running unit).
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        let first = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                None
            }
            joined = self.units.join_next() => joined,
        };

        self.cancel.cancel();
        let drained = self.drain().await;

        match first {
            None => Ok(()),
            Some(joined) => Err(unit_failure(joined)),
        }?;

        // Graceful path: surface a unit that failed while draining.
        for joined in drained {
            if let (name, Err(err)) = joined? {
                warn!(unit = name, error = %err, "unit failed during shutdown");
            }
        }
        Ok(())
    }

    /// Join remaining units within the grace window, aborting stragglers.
    async fn drain(&mut self) -> Vec<std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>> {
        let mut outcomes = Vec::new();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        loop {
            let joined = tokio::select! {
                joined = self.units.join_next() => joined,
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("shutdown grace period elapsed, aborting remaining units");
                    self.units.abort_all();
                    // Collect the aborted outcomes too
                    while let Some(joined) = self.units.join_next().await {
                        if !joined.as_ref().is_err_and(|e| e.is_cancelled()) {
                            outcomes.push(joined);
                        }
                    }
                    break;
                }
            };
            match joined {
                Some(joined) => outcomes.push(joined),
                None => break,
            }
        }

        outcomes
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn unit_failure(
    joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>,
) -> anyhow::Error {
    match joined {
        Ok((name, Ok(()))) => anyhow!("unit '{}' exited unexpectedly", name),
        Ok((name, Err(err))) => err.context(format!("unit '{}' failed", name)),
        Err(join_err) => anyhow!(join_err).context("a supervised unit panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn never() {
        futures::future::pending::<()>().await
    }

    #[tokio::test]
    async fn test_failing_unit_terminates_the_harness() {
        let mut sup = Supervisor::new();
        let cancel = sup.cancel_token();

        sup.spawn("boom", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            anyhow::bail!("watch blew up")
        });
        sup.spawn("peer", async move {
            cancel.cancelled().await;
            Ok(())
        });

        let err = tokio::time::timeout(Duration::from_secs(2), sup.run(never()))
            .await
            .expect("harness did not terminate")
            .unwrap_err();
        assert!(err.to_string().contains("unit 'boom' failed"));
    }

    #[tokio::test]
    async fn test_unexpected_clean_exit_is_an_error() {
        let mut sup = Supervisor::new();
        let cancel = sup.cancel_token();

        sup.spawn("quitter", async { Ok(()) });
        sup.spawn("peer", async move {
            cancel.cancelled().await;
            Ok(())
        });

        let err = tokio::time::timeout(Duration::from_secs(2), sup.run(never()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("exited unexpectedly"));
    }

    #[tokio::test]
    async fn test_panicking_unit_is_captured() {
        let mut sup = Supervisor::new();
        sup.spawn("panicker", async { panic!("oops") });

        let err = tokio::time::timeout(Duration::from_secs(2), sup.run(never()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_shutdown_future_exits_cleanly() {
        let mut sup = Supervisor::new();
        let cancel_a = sup.cancel_token();
        let cancel_b = sup.cancel_token();

        sup.spawn("a", async move {
            cancel_a.cancelled().await;
            Ok(())
        });
        sup.spawn("b", async move {
            cancel_b.cancelled().await;
            Ok(())
        });

        tokio::time::timeout(
            Duration::from_secs(2),
            sup.run(tokio::time::sleep(Duration::from_millis(10))),
        )
        .await
        .expect("harness did not shut down")
        .expect("graceful shutdown should be Ok");
    }
}
