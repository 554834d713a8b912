// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resumable event watching
//!
//! The transport is abstracted behind the [`EventsApi`] trait so the watch
//! state machine can be driven by a scripted source in tests; the
//! production implementation wraps `kube::Api<Event>`.

mod api;
mod resumable;

pub use api::KubeEventsApi;
pub use resumable::ResumableWatcher;

use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::Event;
use kube::core::WatchEvent;

/// A consistent snapshot of the event collection and its resume cursor.
/// Snapshot items bound the initial sync: they are consumed for the cursor
/// only and are never delivered.
pub struct EventSnapshot {
    pub resource_version: Option<String>,
    pub items: Vec<Event>,
}

/// The list-then-watch surface of the Kubernetes events API.
#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list_events(&self) -> kube::Result<EventSnapshot>;

    /// Open a streaming watch starting at `resource_version`, closing
    /// server-side after `timeout_secs`.
    async fn watch_events(
        &self,
        resource_version: &str,
        timeout_secs: u32,
    ) -> kube::Result<BoxStream<'static, kube::Result<WatchEvent<Event>>>>;
}
