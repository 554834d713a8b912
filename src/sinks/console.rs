// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Console sink: rendered payloads go to standard output verbatim.

use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::events::WatchedEvent;
use crate::sinks::template::Renderer;
use crate::sinks::Sink;

const DEFAULT_TEMPLATE: &str = "> {event.signature}\n{event.message}\n";

#[derive(Debug)]
pub struct ConsoleSink {
    name: String,
    renderer: Renderer,
}

impl ConsoleSink {
    pub fn new(
        name: &str,
        template: Option<&str>,
        init: Option<&str>,
        context: Option<&str>,
    ) -> Result<Self> {
        let renderer = Renderer::new(template.unwrap_or(DEFAULT_TEMPLATE), init, context)?;
        Ok(Self { name: name.to_string(), renderer })
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &WatchedEvent) -> Result<()> {
        let payload = self.renderer.render(event)?;
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(payload.as_bytes())
            .and_then(|_| stdout.flush())
            .context("writing to stdout")?;
        Ok(())
    }
}
