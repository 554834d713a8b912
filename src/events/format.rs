// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Canonical event signature and human-readable age formatting
//!
//! The signature `Kind:Namespace/Name:Reason(Component/Host)` is derived
//! once per event and used uniformly for pattern matching and display.
//! All formatting is pure given an explicit `now`.

use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Event;

/// `{kind}:{namespace/name or name}:{reason}({component[/host]})`
///
/// An absent involved-object kind renders as an empty string, producing a
/// signature that begins with `:`. An absent namespace renders the bare
/// object name.
pub fn signature(event: &Event) -> String {
    format!(
        "{}:{}:{}({})",
        involved_object_kind(event),
        involved_object_label(event),
        event.reason.as_deref().unwrap_or(""),
        source_label(event),
    )
}

/// `namespace/name` for namespaced objects, bare `name` otherwise.
pub fn involved_object_label(event: &Event) -> String {
    let obj = &event.involved_object;
    let name = obj.name.as_deref().unwrap_or("");
    match obj.namespace.as_deref() {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
        _ => name.to_string(),
    }
}

pub fn involved_object_kind(event: &Event) -> String {
    event.involved_object.kind.clone().unwrap_or_default()
}

/// `component/host`, or just `component` when the source has no host.
pub fn source_label(event: &Event) -> String {
    let source = event.source.clone().unwrap_or_default();
    let component = source.component.unwrap_or_default();
    match source.host {
        Some(host) if !host.is_empty() => format!("{}/{}", component, host),
        _ => component,
    }
}

/// `"<short(last)> (x<count> over <short(first)>)"` for repeated events,
/// `"<short(last)>"` otherwise.
pub fn age_summary(event: &Event, now: DateTime<Utc>) -> String {
    let short_age = match &event.last_timestamp {
        Some(ts) => short_duration(now - ts.0),
        None => "<unknown>".to_string(),
    };

    let count = event.count.unwrap_or(1);
    if count > 1 {
        let span = match &event.first_timestamp {
            Some(ts) => short_duration(now - ts.0),
            None => "<unknown>".to_string(),
        };
        format!("{} (x{} over {})", short_age, count, span)
    } else {
        short_age
    }
}

/// Largest whole unit at or above seconds, rounding down; fractional years
/// past 365 days. Deltas more than a second in the future render as an
/// explicit invalid marker, within one second of skew as `0s`.
pub fn short_duration(delta: Duration) -> String {
    let seconds = delta.num_seconds();

    if seconds < -1 {
        return "<invalid>".to_string();
    }
    if seconds < 0 {
        return "0s".to_string();
    }
    if seconds < 60 {
        return format!("{}s", seconds);
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 365 {
        return format!("{}d", days);
    }

    format!("{}y", days as f64 / 365.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::test_event;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    #[test]
    fn test_signature_round_trip() {
        let event = test_event("Pod", Some("default"), "web-1", "Failed", "kubelet", Some("node1"));
        assert_eq!(signature(&event), "Pod:default/web-1:Failed(kubelet/node1)");
    }

    #[test]
    fn test_signature_without_host() {
        let event = test_event("Pod", Some("default"), "web-1", "Failed", "kubelet", None);
        assert_eq!(signature(&event), "Pod:default/web-1:Failed(kubelet)");
    }

    #[test]
    fn test_signature_without_kind_starts_with_colon() {
        let mut event = test_event("", Some("default"), "web-1", "Failed", "kubelet", None);
        event.involved_object.kind = None;
        assert_eq!(signature(&event), ":default/web-1:Failed(kubelet)");
    }

    #[test]
    fn test_signature_cluster_scoped_object() {
        let event = test_event("Node", None, "worker-1", "NodeReady", "kubelet", Some("worker-1"));
        assert_eq!(signature(&event), "Node:worker-1:NodeReady(kubelet/worker-1)");
    }

    #[test]
    fn test_short_duration_units() {
        assert_eq!(short_duration(Duration::seconds(5)), "5s");
        assert_eq!(short_duration(Duration::seconds(59)), "59s");
        assert_eq!(short_duration(Duration::seconds(60)), "1m");
        assert_eq!(short_duration(Duration::seconds(3700)), "1h");
        assert_eq!(short_duration(Duration::hours(25)), "1d");
        assert_eq!(short_duration(Duration::days(730)), "2y");
    }

    #[test]
    fn test_short_duration_clock_skew() {
        assert_eq!(short_duration(Duration::milliseconds(-500)), "0s");
        assert_eq!(short_duration(Duration::seconds(-2)), "<invalid>");
    }

    #[test]
    fn test_age_summary_single_occurrence() {
        let now = Utc::now();
        let mut event = test_event("Pod", Some("default"), "web-1", "Failed", "kubelet", None);
        event.last_timestamp = Some(Time(now - Duration::seconds(5)));
        event.count = Some(1);
        assert_eq!(age_summary(&event, now), "5s");
    }

    #[test]
    fn test_age_summary_repeated() {
        let now = Utc::now();
        let mut event = test_event("Pod", Some("default"), "web-1", "Failed", "kubelet", None);
        event.last_timestamp = Some(Time(now - Duration::seconds(65)));
        event.first_timestamp = Some(Time(now - Duration::seconds(3700)));
        event.count = Some(3);
        assert_eq!(age_summary(&event, now), "1m (x3 over 1h)");
    }

    #[test]
    fn test_age_summary_missing_timestamp() {
        let now = Utc::now();
        let mut event = test_event("Pod", Some("default"), "web-1", "Failed", "kubelet", None);
        event.last_timestamp = None;
        assert_eq!(age_summary(&event, now), "<unknown>");
    }
}
