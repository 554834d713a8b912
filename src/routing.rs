// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Event routing
//!
//! An ordered list of mappings, each binding one sink to optional
//! include/exclude pattern sets, preceded by a pipeline-wide ignore list.
//! All patterns are normalized once here at construction; evaluation per
//! event is side-effect-free and never fails.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::{Config, MappingConfig};
use crate::events::WatchedEvent;
use crate::matcher;
use crate::sinks::Sink;

#[derive(Debug)]
struct Mapping {
    sink: Arc<dyn Sink>,
    /// None matches everything; an empty normalized list matches nothing.
    include: Option<Vec<String>>,
    /// None excludes nothing.
    exclude: Option<Vec<String>>,
}

impl Mapping {
    fn new(config: &MappingConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            include: config.include.as_deref().map(matcher::normalize),
            exclude: config.exclude.as_deref().map(matcher::normalize),
        }
    }

    fn matches(&self, signature: &str) -> bool {
        if let Some(include) = &self.include {
            if !matcher::matches_any(signature, include) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if matcher::matches_any(signature, exclude) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct RoutingTable {
    ignore: Vec<String>,
    mappings: Vec<Mapping>,
}

impl RoutingTable {
    pub fn new(config: &Config, sinks: &HashMap<String, Arc<dyn Sink>>) -> Result<Self> {
        let mappings = config
            .mappings
            .iter()
            .map(|m| {
                let sink = sinks
                    .get(&m.sink)
                    .cloned()
                    .ok_or_else(|| anyhow!("mapping references unknown sink '{}'", m.sink))?;
                Ok(Mapping::new(m, sink))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            ignore: matcher::normalize(&config.ignore),
            mappings,
        })
    }

    /// Sinks this event routes to, in configuration order. The legacy
    /// ignore list is evaluated first and suppresses the event entirely.
    pub fn route(&self, event: &WatchedEvent) -> Vec<Arc<dyn Sink>> {
        for pattern in &self.ignore {
            if matcher::glob_match(pattern, &event.signature) {
                info!(event = %event.signature, pattern = %pattern, "suppressed ignored event");
                return Vec::new();
            }
        }

        self.mappings
            .iter()
            .filter(|m| m.matches(&event.signature))
            .map(|m| Arc::clone(&m.sink))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_event;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NullSink(String);

    #[async_trait]
    impl Sink for NullSink {
        fn name(&self) -> &str {
            &self.0
        }

        async fn deliver(&self, _event: &WatchedEvent) -> Result<()> {
            Ok(())
        }
    }

    fn table(yaml: &str) -> RoutingTable {
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let sinks: HashMap<String, Arc<dyn Sink>> = config
            .sinks
            .keys()
            .map(|name| {
                (name.clone(), Arc::new(NullSink(name.clone())) as Arc<dyn Sink>)
            })
            .collect();
        RoutingTable::new(&config, &sinks).unwrap()
    }

    fn event(host: &str) -> WatchedEvent {
        WatchedEvent::new(test_event(
            "Pod",
            Some("default"),
            "web-1",
            "Failed",
            "kubelet",
            Some(host),
        ))
    }

    fn console_only() -> &'static str {
        "version: 1\nsinks:\n  console: {type: console}\n"
    }

    #[test]
    fn test_include_exclude_by_source() {
        let table = table(&format!(
            "{}mappings:\n  - sink: console\n    include: [\"Pod:*:Failed(*)\"]\n    exclude: [\"Pod:*:Failed(*prod*)\"]\n",
            console_only()
        ));

        assert_eq!(table.route(&event("node1")).len(), 1);
        assert!(table.route(&event("node1-prod")).is_empty());
    }

    #[test]
    fn test_absent_include_matches_all() {
        let table = table(&format!("{}mappings:\n  - sink: console\n", console_only()));
        assert_eq!(table.route(&event("node1")).len(), 1);
    }

    #[test]
    fn test_empty_include_matches_nothing() {
        let table = table(&format!(
            "{}mappings:\n  - sink: console\n    include: []\n",
            console_only()
        ));
        assert!(table.route(&event("node1")).is_empty());
    }

    #[test]
    fn test_blank_only_include_matches_nothing() {
        let table = table(&format!(
            "{}mappings:\n  - sink: console\n    include: [\"  \"]\n",
            console_only()
        ));
        assert!(table.route(&event("node1")).is_empty());
    }

    #[test]
    fn test_fan_out_preserves_configuration_order() {
        let yaml = "version: 1\nsinks:\n  a: {type: console}\n  b: {type: console}\n\
                    mappings:\n  - sink: b\n  - sink: a\n";
        let table = table(yaml);
        let routed = table.route(&event("node1"));
        let names: Vec<&str> = routed.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_ignore_suppresses_before_mappings() {
        let table = table(&format!(
            "{}mappings:\n  - sink: console\nignore: [\"Pod:*:Failed\"]\n",
            console_only()
        ));
        assert!(table.route(&event("node1")).is_empty());
    }

    #[test]
    fn test_ignore_pattern_gets_source_qualifier() {
        // "Pod:*:Failed" normalizes to "Pod:*:Failed(*)" and still matches
        // events with any source.
        let table = table(&format!("{}ignore: [\"Pod:*:Failed\"]\n", console_only()));
        assert!(table.route(&event("node1")).is_empty());
    }

    #[test]
    fn test_event_can_route_to_zero_sinks() {
        let table = table(&format!(
            "{}mappings:\n  - sink: console\n    include: [\"Node:*\"]\n",
            console_only()
        ));
        assert!(table.route(&event("node1")).is_empty());
    }

    #[test]
    fn test_unknown_sink_is_an_error() {
        let config: Config = serde_yaml::from_str(
            "version: 1\nsinks: {}\nmappings:\n  - sink: ghost\n",
        )
        .unwrap();
        let err = RoutingTable::new(&config, &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("unknown sink 'ghost'"));
    }
}
