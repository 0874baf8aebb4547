//! Composition root: parses CLI flags, resolves settings, wires every
//! singleton into a `HandlerCtx`, binds the TCP/UDP sockets, and drives
//! signal-triggered graceful shutdown (spec.md §4.8, §6; SPEC_FULL.md
//! "(AMBIENT) Signal handling").

mod cli;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use master_handlers::{Dispatcher, HandlerCtx};
use master_model::ChannelDirectory;
use master_net::{NetConfig, PacketDumper, Server};
use master_registry::SessionRegistry;
use master_userservice::{Probe, UserService, UserServiceClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(cli)?;

    let channel_servers = settings::default_channel_servers();
    settings::validate_nonempty(&channel_servers)?;
    let directory = Arc::new(ChannelDirectory::new(channel_servers));

    let userservice: Arc<dyn UserService> = Arc::new(
        UserServiceClient::new(&settings.userservice_host, settings.userservice_port)
            .context("building the user service HTTP client")?,
    );
    let probe = Arc::new(Probe::new(Arc::clone(&userservice)));
    let registry = Arc::new(SessionRegistry::new());

    let ctx = Arc::new(HandlerCtx::new(
        Arc::clone(&registry),
        Arc::clone(&directory),
        Arc::clone(&userservice),
        Arc::clone(&probe),
    ));
    let dispatcher = Arc::new(Dispatcher::new(ctx));

    let dumper = if settings.log_packets {
        Some(Arc::new(
            PacketDumper::start("packet_dumps".into())
                .await
                .context("starting the packet dumper")?,
        ))
    } else {
        None
    };

    let net_config = NetConfig {
        bind_ip: settings.bind_ip,
        tcp_port: settings.tcp_port,
        udp_port: settings.udp_port,
        idle_timeout: settings.idle_timeout,
    };

    let server = Arc::new(Server::bind(net_config, dumper, dispatcher).await?);
    let (accept_task, udp_task) = server.run();
    let probe_task = probe.spawn_ticker(server.shutdown_receiver());

    info!(addr = %server.local_tcp_addr(), "master server running");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    server.stop().await;
    accept_task.abort();
    udp_task.abort();
    probe_task.abort();

    Ok(())
}

/// `SIGINT`/`SIGTERM` both initiate graceful shutdown (spec.md §5). On
/// platforms without `SIGTERM` (non-unix), only `ctrl_c` is selected on.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
