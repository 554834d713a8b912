// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The list-then-watch state machine
//!
//! LISTING captures the resume cursor from a full snapshot (its items are
//! never delivered), WATCHING consumes change notifications and advances
//! the cursor, RECONNECTING reopens the stream at the preserved cursor on
//! clean closure or a transport-level read error. A stale cursor (410
//! Gone) clears the cursor and relists. Any other API failure is fatal and
//! surfaces through the supervision harness.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use kube::core::WatchEvent;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::EventsApi;
use crate::config::WatchConfig;
use crate::events::WatchedEvent;

pub struct ResumableWatcher<S> {
    source: S,
    policy: WatchConfig,
}

impl<S: EventsApi> ResumableWatcher<S> {
    pub fn new(source: S, policy: WatchConfig) -> Self {
        Self { source, policy }
    }

    /// Run until cancelled or a fatal transport error. Accepted events are
    /// enqueued fire-and-forget; a closed queue means the process is
    /// shutting down and ends the watcher cleanly.
    pub async fn run(
        self,
        queue: UnboundedSender<WatchedEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        'listing: loop {
            let snapshot = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = self.source.list_events() => result.context("listing events")?,
            };
            let mut version = snapshot
                .resource_version
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("event list did not include a resourceVersion"))?;
            info!(existing = snapshot.items.len(), %version, "initial sync complete");

            loop {
                let timeout_secs = jittered_timeout_secs(self.policy.min_timeout_secs);
                debug!(%version, timeout_secs, "watching events");

                let stream = tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = self.source.watch_events(&version, timeout_secs) => {
                        result.context("opening watch")?
                    }
                };
                futures::pin_mut!(stream);

                loop {
                    let item = tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        item = stream.next() => item,
                    };

                    match item {
                        // Clean closure or server-side timeout: reopen at
                        // the preserved cursor.
                        None => {
                            info!("watch connection closed");
                            break;
                        }
                        Some(Ok(WatchEvent::Added(event))) => {
                            advance(&mut version, event.metadata.resource_version.as_deref());
                            if queue.send(WatchedEvent::new(event)).is_err() {
                                return Ok(());
                            }
                        }
                        Some(Ok(WatchEvent::Modified(event))) => {
                            advance(&mut version, event.metadata.resource_version.as_deref());
                            if self.policy.deliver_modified
                                && queue.send(WatchedEvent::new(event)).is_err()
                            {
                                return Ok(());
                            }
                        }
                        Some(Ok(WatchEvent::Deleted(event))) => {
                            advance(&mut version, event.metadata.resource_version.as_deref());
                        }
                        Some(Ok(WatchEvent::Bookmark(bookmark))) => {
                            version = bookmark.metadata.resource_version.clone();
                        }
                        Some(Ok(WatchEvent::Error(err))) if err.code == 410 => {
                            info!("resume cursor too old, relisting");
                            continue 'listing;
                        }
                        Some(Ok(WatchEvent::Error(err))) => {
                            return Err(anyhow!(err).context("watch stream error"));
                        }
                        Some(Err(kube::Error::Api(err))) if err.code == 410 => {
                            info!("resume cursor too old, relisting");
                            continue 'listing;
                        }
                        Some(Err(kube::Error::Api(err))) => {
                            return Err(anyhow!(err).context("watch stream error"));
                        }
                        // Transport-level read errors (timeouts, resets)
                        // are transient; reopen at the preserved cursor.
                        Some(Err(err)) => {
                            info!(error = %err, "watch read interrupted, reopening");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// The cursor follows the stream; absent versions on a notification leave
/// it untouched rather than rewinding.
fn advance(version: &mut String, observed: Option<&str>) {
    if let Some(observed) = observed {
        if !observed.is_empty() {
            *version = observed.to_string();
        }
    }
}

/// Uniform draw from [T, 2T] so many watcher instances don't reconnect in
/// lockstep.
fn jittered_timeout_secs(base_secs: u64) -> u32 {
    let base = base_secs.max(1);
    rand::thread_rng().gen_range(base..=base * 2) as u32
}
