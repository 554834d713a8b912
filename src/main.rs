// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
mod config;
mod dispatch;
mod events;
mod matcher;
mod routing;
mod sinks;
mod supervisor;
mod watcher;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use cli::Args;
use config::Config;
use routing::RoutingTable;
use supervisor::Supervisor;
use watcher::{KubeEventsApi, ResumableWatcher};

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

async fn kube_client(args: &Args) -> Result<kube::Client> {
    let config = if args.in_cluster {
        kube::Config::incluster().context("loading in-cluster configuration")?
    } else if let Some(master) = &args.master {
        kube::Config::new(master.parse::<http::Uri>().context("invalid --master URL")?)
    } else {
        kube::Config::infer().await.context("inferring Kubernetes configuration")?
    };
    kube::Client::try_from(config).context("building Kubernetes client")
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                _ = sigint.recv() => info!("SIGINT received, shutting down"),
            }
        }
        _ => {
            let _ = tokio::signal::ctrl_c().await;
            info!("Ctrl-C received, shutting down");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Ctrl-C received, shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    init_logging(&args.log_level);

    // Everything configuration-dependent fails here, before any watch
    let config = Config::load(&args.config)?;
    let http_client = reqwest::Client::new();
    let sinks = sinks::build_sinks(&config.sinks, &http_client)?;
    let routes = Arc::new(RoutingTable::new(&config, &sinks)?);

    let client = kube_client(&args).await?;
    let watcher = ResumableWatcher::new(KubeEventsApi::new(client), config.watch.clone());

    let (queue_tx, queue_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut supervisor = Supervisor::new();
    let watcher_cancel = supervisor.cancel_token();
    supervisor.spawn("watcher", watcher.run(queue_tx, watcher_cancel));
    let dispatcher_cancel = supervisor.cancel_token();
    supervisor.spawn("dispatcher", dispatch::run(queue_rx, routes, dispatcher_cancel));

    supervisor.run(shutdown_signal()).await
}
