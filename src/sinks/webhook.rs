// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Chat-webhook sink (Slack-compatible)
//!
//! A thin specialization of the HTTP sink: always POST, always JSON, with
//! stock compact/verbose attachment payloads when no template is
//! configured. The stock context script escapes the interpolated fields
//! and classifies the event color as warning/good.

use anyhow::Result;

use crate::sinks::http::HttpSink;
use crate::sinks::template::Renderer;

const DEFAULT_CONTEXT: &str = "\
obj = escape_json(format_involved_object(event))
kind = escape_json(format_involved_object_kind(event))
reason = escape_json(event.reason)
msg = escape_json(event.message)
color = lower(event.type) == 'warning' ? 'warning' : 'good'
";

const COMPACT_TEMPLATE: &str = r#"{{"text": "**{kind} {obj} – {reason}**\n{msg}"}}"#;

const VERBOSE_TEMPLATE: &str = r#"
{{
    "attachments": [{{
        "color": "{color}",
        "fallback": "**{kind} {obj} – {reason}**\n{msg}",
        "fields": [
            {{
                "title": "Namespace",
                "value": "{escape_json(event.metadata.namespace)}"
            }},
            {{
                "title": "{kind}",
                "value": "{obj}"
            }},
            {{
                "title": "Message",
                "value": "{msg}"
            }},
            {{
                "title": "Reason",
                "value": "{reason}",
                "short": true
            }},
            {{
                "title": "Type",
                "value": "{escape_json(event.type)}",
                "short": true
            }},
            {{
                "title": "Age",
                "value": "{escape_json(format_event_age(event))}",
                "short": true
            }},
            {{
                "title": "From",
                "value": "{escape_json(format_event_source(event))}"
            }}
        ]
    }}]
}}
"#;

/// Build a webhook sink. A configured template overrides the stock
/// payloads entirely; otherwise `compact` selects between them and the
/// stock context script is used unless one is supplied.
#[allow(clippy::too_many_arguments)]
pub fn build(
    name: &str,
    client: reqwest::Client,
    url: &str,
    compact: bool,
    timeout_secs: u64,
    template: Option<&str>,
    init: Option<&str>,
    context: Option<&str>,
) -> Result<HttpSink> {
    let (template, context) = match template {
        Some(t) => (t, context),
        None => {
            let stock = if compact { COMPACT_TEMPLATE } else { VERBOSE_TEMPLATE };
            (stock, context.or(Some(DEFAULT_CONTEXT)))
        }
    };

    let renderer = Renderer::new(template, init, context)?;
    HttpSink::new(name, client, url, "POST", "application/json", timeout_secs, renderer)
}
