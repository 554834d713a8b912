// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Delivery sinks
//!
//! A sink is a named delivery target: a render template plus a transport.
//! Sinks are stateless across events apart from fixed configuration, and a
//! failure in one sink never affects another.

mod console;
mod http;
pub mod template;
mod webhook;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::SinkConfig;
use crate::events::WatchedEvent;
use crate::sinks::template::Renderer;

pub use console::ConsoleSink;
pub use http::HttpSink;

#[async_trait]
pub trait Sink: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Render the event and perform the transport action. Errors are
    /// handled by the dispatcher (logged, never fatal).
    async fn deliver(&self, event: &WatchedEvent) -> Result<()>;
}

/// Build all configured sinks. The HTTP client is shared across sinks;
/// per-request timeouts come from each sink's config.
pub fn build_sinks(
    configs: &BTreeMap<String, SinkConfig>,
    client: &reqwest::Client,
) -> Result<HashMap<String, Arc<dyn Sink>>> {
    configs
        .iter()
        .map(|(name, config)| {
            let sink = build_sink(name, config, client)
                .with_context(|| format!("in sink '{}'", name))?;
            Ok((name.clone(), sink))
        })
        .collect()
}

fn build_sink(
    name: &str,
    config: &SinkConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn Sink>> {
    Ok(match config {
        SinkConfig::Console { template, template_context, template_context_init } => {
            Arc::new(ConsoleSink::new(
                name,
                template.as_deref(),
                template_context_init.as_deref(),
                template_context.as_deref(),
            )?)
        }
        SinkConfig::Webhook {
            url,
            compact,
            timeout,
            template,
            template_context,
            template_context_init,
        } => Arc::new(webhook::build(
            name,
            client.clone(),
            url,
            *compact,
            *timeout,
            template.as_deref(),
            template_context_init.as_deref(),
            template_context.as_deref(),
        )?),
        SinkConfig::Http {
            url,
            method,
            content_type,
            timeout,
            template,
            template_context,
            template_context_init,
        } => {
            let renderer = Renderer::new(
                template.as_deref().unwrap_or(http::DEFAULT_TEMPLATE),
                template_context_init.as_deref(),
                template_context.as_deref(),
            )?;
            Arc::new(HttpSink::new(
                name,
                client.clone(),
                url,
                method,
                content_type,
                *timeout,
                renderer,
            )?)
        }
    })
}
