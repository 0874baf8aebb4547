//! Command-line flags (spec.md §6 "CLI"), in the teacher's
//! `packet_inspector::Cli` `clap::Parser` shape.

use std::net::IpAddr;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Legacy-shooter master server")]
pub struct Cli {
    /// Bind to this exact address. Mutually exclusive with `--interface`.
    #[arg(short = 'i', long = "ip-address", conflicts_with = "interface")]
    pub ip_address: Option<IpAddr>,

    /// Bind to the address of a named local network interface.
    #[arg(short = 'I', long = "interface")]
    pub interface: Option<String>,

    /// TCP port for the session listener.
    #[arg(short = 'p', long = "port-master", default_value_t = master_net::DEFAULT_TCP_PORT)]
    pub port_master: u16,

    /// UDP port for the NAT holepunch echo.
    #[arg(short = 'P', long = "port-holepunch", default_value_t = master_net::DEFAULT_UDP_PORT)]
    pub port_holepunch: u16,

    /// Dump every inbound/outbound frame to disk for forensic replay.
    #[arg(short = 'l', long = "log-packets")]
    pub log_packets: bool,
}
