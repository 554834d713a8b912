// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Generic HTTP sink
//!
//! Sends the rendered payload as the request body with a configurable
//! method, content type and timeout. A non-2xx response is a handled
//! delivery error carrying the status and (truncated) response body.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::events::WatchedEvent;
use crate::sinks::template::Renderer;
use crate::sinks::Sink;

pub const DEFAULT_TEMPLATE: &str = "{event.message}";

/// How much of an error response body to keep in the log message.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug)]
pub struct HttpSink {
    name: String,
    client: reqwest::Client,
    url: String,
    method: reqwest::Method,
    content_type: String,
    timeout: Duration,
    renderer: Renderer,
}

impl HttpSink {
    pub fn new(
        name: &str,
        client: reqwest::Client,
        url: &str,
        method: &str,
        content_type: &str,
        timeout_secs: u64,
        renderer: Renderer,
    ) -> Result<Self> {
        if url.trim().is_empty() {
            bail!("url must not be empty");
        }
        let method: reqwest::Method = method
            .parse()
            .with_context(|| format!("invalid HTTP method '{}'", method))?;

        Ok(Self {
            name: name.to_string(),
            client,
            url: url.to_string(),
            method,
            content_type: content_type.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            renderer,
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &WatchedEvent) -> Result<()> {
        let body = self.renderer.render(event)?;

        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .header(CONTENT_TYPE, &self.content_type)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut end = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            bail!("{}: {}", status, body);
        }

        Ok(())
    }
}
