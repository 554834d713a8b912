// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Production `EventsApi` over the cluster-wide core/v1 events collection.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Event;
use kube::api::{Api, ListParams, WatchParams};
use kube::core::WatchEvent;
use kube::Client;

use super::{EventSnapshot, EventsApi};

pub struct KubeEventsApi {
    api: Api<Event>,
}

impl KubeEventsApi {
    /// Watch events across all namespaces.
    pub fn new(client: Client) -> Self {
        Self { api: Api::all(client) }
    }
}

#[async_trait]
impl EventsApi for KubeEventsApi {
    async fn list_events(&self) -> kube::Result<EventSnapshot> {
        let list = self.api.list(&ListParams::default()).await?;
        Ok(EventSnapshot {
            resource_version: list.metadata.resource_version,
            items: list.items,
        })
    }

    async fn watch_events(
        &self,
        resource_version: &str,
        timeout_secs: u32,
    ) -> kube::Result<BoxStream<'static, kube::Result<WatchEvent<Event>>>> {
        let params = WatchParams::default().timeout(timeout_secs);
        let stream = self.api.watch(&params, resource_version).await?;
        Ok(stream.boxed())
    }
}
