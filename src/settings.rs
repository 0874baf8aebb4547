//! Collects CLI flags and environment variables into one immutable
//! `Settings` before any socket opens (SPEC_FULL.md §3 "(AMBIENT)
//! Configuration data").

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use master_model::ChannelServer;

use crate::cli::Cli;

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct Settings {
    pub bind_ip: IpAddr,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub log_packets: bool,
    pub userservice_host: String,
    pub userservice_port: u16,
    pub upstream_timeout: Duration,
    pub upstream_probe_interval: Duration,
    pub idle_timeout: Duration,
}

impl Settings {
    /// Resolves `--ip-address`/`--interface` to a concrete bind address
    /// (exit code 1 if a named interface can't be found, spec.md §6), then
    /// layers the `USERSERVICE_HOST`/`USERSERVICE_PORT` env vars on top.
    /// `--ip-address`/`--interface` being mutually exclusive is already
    /// enforced by clap's `conflicts_with` before this runs.
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let bind_ip = match (cli.ip_address, cli.interface.as_deref()) {
            (Some(ip), None) => ip,
            (None, Some(name)) => resolve_interface(name)
                .with_context(|| format!("no such network interface: {name}"))?,
            (None, None) => IpAddr::from([0, 0, 0, 0]),
            (Some(_), Some(_)) => unreachable!("clap enforces conflicts_with"),
        };

        let userservice_host = env::var("USERSERVICE_HOST")
            .context("USERSERVICE_HOST environment variable must be set")?;
        let userservice_port = env::var("USERSERVICE_PORT")
            .context("USERSERVICE_PORT environment variable must be set")?
            .parse::<u16>()
            .context("USERSERVICE_PORT must be a valid port number")?;

        Ok(Self {
            bind_ip,
            tcp_port: cli.port_master,
            udp_port: cli.port_holepunch,
            log_packets: cli.log_packets,
            userservice_host,
            userservice_port,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            upstream_probe_interval: DEFAULT_PROBE_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }
}

/// Interface name -> IP resolution is an external collaborator contract
/// (spec.md §1 "environment/interface selection" is out of scope); this is
/// the single seam that fulfills it, backed by `get_if_addrs` the way
/// `examples/other_examples/…TING-HiuYu-Remote-Mic`'s network-discovery
/// code does (see DESIGN.md).
fn resolve_interface(name: &str) -> Option<IpAddr> {
    let interfaces = get_if_addrs::get_if_addrs().ok()?;
    interfaces
        .into_iter()
        .find(|iface| iface.name == name)
        .map(|iface| iface.ip())
}

/// The "fixed, configured list of channel servers" (spec.md §3, §4.6). No
/// CLI flag exposes this, so it is a fixed default for this deployment —
/// see DESIGN.md's Open Question decision.
pub fn default_channel_servers() -> Vec<ChannelServer> {
    vec![
        ChannelServer::new(
            "NA-1",
            ["General", "Casual", "Competitive"].map(String::from),
        ),
        ChannelServer::new("EU-1", ["General", "Casual"].map(String::from)),
    ]
}

/// `if-addrs`-style interface lookups fail closed: an empty or unreadable
/// interface table is "not found", matching the spec's exit-code-1
/// contract rather than panicking.
pub fn validate_nonempty(servers: &[ChannelServer]) -> anyhow::Result<()> {
    if servers.is_empty() || servers.iter().all(|s| s.channels.is_empty()) {
        bail!("channel server directory must have at least one channel");
    }
    Ok(())
}
