// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration loading for kew
//!
//! The config file is YAML: a `sinks` table, an ordered `mappings` list
//! binding sinks to include/exclude patterns, an optional legacy `ignore`
//! list applied pipeline-wide, and watch policy. All validation happens
//! here at startup, before any watch begins.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: u32,
    pub sinks: BTreeMap<String, SinkConfig>,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
    /// Legacy flat ignore list; suppresses matching events before any
    /// mapping is evaluated.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "invalid config version {}, expected {}",
                self.version,
                CONFIG_VERSION
            );
        }
        for mapping in &self.mappings {
            if !self.sinks.contains_key(&mapping.sink) {
                bail!("mapping references unknown sink '{}'", mapping.sink);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    pub sink: String,
    /// Absent means "match all"; an empty list matches nothing.
    #[serde(default)]
    pub include: Option<Vec<String>>,
    /// Absent means "exclude nothing".
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Base watch timeout T; each watch is opened with a timeout drawn
    /// uniformly from [T, 2T] to spread reconnects across instances.
    #[serde(default = "default_min_timeout")]
    pub min_timeout_secs: u64,
    /// Whether MODIFIED change notifications are delivered in addition to
    /// ADDED ones.
    #[serde(default)]
    pub deliver_modified: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            min_timeout_secs: default_min_timeout(),
            deliver_modified: false,
        }
    }
}

fn default_min_timeout() -> u64 {
    300
}

fn default_delivery_timeout() -> u64 {
    5
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum SinkConfig {
    /// Write rendered payloads to standard output.
    Console {
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        template_context: Option<String>,
        #[serde(default)]
        template_context_init: Option<String>,
    },
    /// Chat-webhook delivery (Slack-compatible JSON payload).
    Webhook {
        url: String,
        #[serde(default)]
        compact: bool,
        #[serde(default = "default_delivery_timeout")]
        timeout: u64,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        template_context: Option<String>,
        #[serde(default)]
        template_context_init: Option<String>,
    },
    /// Generic HTTP delivery with configurable method and content type.
    Http {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default = "default_content_type")]
        content_type: String,
        #[serde(default = "default_delivery_timeout")]
        timeout: u64,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        template_context: Option<String>,
        #[serde(default)]
        template_context_init: Option<String>,
    },
}
