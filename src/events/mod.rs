// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Event model: a raw cluster event plus its cached canonical signature

pub mod format;

use k8s_openapi::api::core::v1::Event;

/// A cluster event as it flows through the pipeline, immutable after
/// receipt. The canonical signature is derived once here and reused for
/// ignore filtering, mapping evaluation and log output.
#[derive(Debug, Clone)]
pub struct WatchedEvent {
    pub raw: Event,
    pub signature: String,
}

impl WatchedEvent {
    pub fn new(raw: Event) -> Self {
        let signature = format::signature(&raw);
        Self { raw, signature }
    }

    /// Resolve a dotted template field path. Absent optional fields resolve
    /// to the empty string; an unknown path is None and surfaces as a
    /// render error at the sink.
    pub fn field(&self, path: &str) -> Option<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();

        Some(match path {
            "signature" => self.signature.clone(),
            "reason" => opt(&self.raw.reason),
            "message" => opt(&self.raw.message),
            "type" => opt(&self.raw.type_),
            "count" => self.raw.count.map(|c| c.to_string()).unwrap_or_default(),
            "metadata.name" => opt(&self.raw.metadata.name),
            "metadata.namespace" => opt(&self.raw.metadata.namespace),
            "metadata.resource_version" => opt(&self.raw.metadata.resource_version),
            "involved_object.kind" => opt(&self.raw.involved_object.kind),
            "involved_object.namespace" => opt(&self.raw.involved_object.namespace),
            "involved_object.name" => opt(&self.raw.involved_object.name),
            "source.component" => {
                self.raw.source.as_ref().and_then(|s| s.component.clone()).unwrap_or_default()
            }
            "source.host" => {
                self.raw.source.as_ref().and_then(|s| s.host.clone()).unwrap_or_default()
            }
            "first_timestamp" => self
                .raw
                .first_timestamp
                .as_ref()
                .map(|t| t.0.to_rfc3339())
                .unwrap_or_default(),
            "last_timestamp" => self
                .raw
                .last_timestamp
                .as_ref()
                .map(|t| t.0.to_rfc3339())
                .unwrap_or_default(),
            _ => return None,
        })
    }
}

/// Build a minimal event for tests; only the fields the pipeline reads.
#[cfg(test)]
pub(crate) fn test_event(
    kind: &str,
    namespace: Option<&str>,
    name: &str,
    reason: &str,
    component: &str,
    host: Option<&str>,
) -> Event {
    use k8s_openapi::api::core::v1::EventSource;

    Event {
        reason: Some(reason.to_string()),
        message: Some(format!("{} happened", reason)),
        type_: Some("Normal".to_string()),
        source: Some(EventSource {
            component: Some(component.to_string()),
            host: host.map(String::from),
        }),
        involved_object: k8s_openapi::api::core::v1::ObjectReference {
            kind: Some(kind.to_string()),
            namespace: namespace.map(String::from),
            name: Some(name.to_string()),
            ..Default::default()
        },
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            name: Some(format!("{}.evt", name)),
            namespace: namespace.map(String::from),
            ..Default::default()
        },
        ..Default::default()
    }
}
