//! Process settings, from flags or the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ipruler::persist;

/// Which driver feeds documents to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Accept documents over HTTP and re-apply the last one periodically.
    #[value(name = "api")]
    Api,
    /// Read the document from a file on every tick.
    #[value(name = "ConfigBased", alias = "config-based")]
    ConfigBased,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ipruler",
    version,
    about = "Policy routing reconciler for rules, routes and VLANs"
)]
pub struct Settings {
    /// Operating mode.
    #[arg(long, env = "MODE", value_enum, ignore_case = true, default_value = "api")]
    pub mode: Mode,

    /// Address the HTTP API binds to.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Port the HTTP API listens on.
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    /// Document read in config-based mode.
    #[arg(long, env = "CONFIG_PATH", default_value = "./config/config.yaml")]
    pub config_path: PathBuf,

    /// Seconds between re-applies.
    #[arg(
        long = "config-reload-duration-seconds",
        env = "CONFIG_RELOAD_DURATION_SECONDS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub reload_seconds: u64,

    /// Write a boot-time replay script after each apply (config-based mode).
    #[arg(
        long,
        env = "ENABLE_PERSISTENCE",
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub enable_persistence: bool,

    /// Replay script location.
    #[arg(long, env = "PERSIST_PATH", default_value = persist::DEFAULT_PATH)]
    pub persist_path: PathBuf,

    /// Lock file the replay script checks.
    #[arg(long, env = "PERSIST_LOCK_PATH", default_value = persist::DEFAULT_LOCK_PATH)]
    pub persist_lock_path: PathBuf,

    /// Log level (INFO, DEBUG, WARN, ERROR). RUST_LOG takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Log planned changes without touching the kernel.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

impl Settings {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.api_port)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_seconds)
    }
}
