// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Event dispatch loop
//!
//! Consumes the watcher's queue strictly in arrival order and delivers
//! each event to every sink its mappings route to. A render or delivery
//! failure at one sink is logged and isolated: it affects neither the
//! other sinks for that event nor any subsequent event.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::events::WatchedEvent;
use crate::routing::RoutingTable;

pub async fn run(
    mut queue: UnboundedReceiver<WatchedEvent>,
    routes: Arc<RoutingTable>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = queue.recv() => match event {
                Some(event) => event,
                // Producer gone; the harness reports the watcher's outcome.
                None => return Ok(()),
            },
        };

        for sink in routes.route(&event) {
            match sink.deliver(&event).await {
                Ok(()) => {
                    debug!(sink = sink.name(), event = %event.signature, "delivered event");
                }
                Err(err) => {
                    error!(
                        sink = sink.name(),
                        event = %event.signature,
                        error = %err,
                        "failed to deliver event"
                    );
                }
            }
        }
    }
}
