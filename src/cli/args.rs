// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "kew")]
#[command(author, version, about = "Watch Kubernetes events and route them to notification sinks")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Kubernetes API server URL (defaults to kubeconfig)
    #[arg(long, value_name = "URL")]
    pub master: Option<String>,

    /// Configure with in-cluster config
    #[arg(long)]
    pub in_cluster: bool,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let args = Args::parse_from(["kew", "--config", "kew.yaml"]);
        assert_eq!(args.config, PathBuf::from("kew.yaml"));
        assert!(args.master.is_none());
        assert!(!args.in_cluster);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_all_flags() {
        let args = Args::parse_from([
            "kew",
            "--config",
            "/etc/kew.yaml",
            "--master",
            "https://10.0.0.1:6443",
            "--in-cluster",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.master.as_deref(), Some("https://10.0.0.1:6443"));
        assert!(args.in_cluster);
        assert_eq!(args.log_level, "debug");
    }
}
