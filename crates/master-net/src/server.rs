//! The server instance: TCP accept loop, UDP holepunch echo, and
//! signal-driven shutdown (spec.md §4.8, §6).

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conn::{spawn_connection, Conn, FrameHandler};
use crate::dumper::PacketDumper;

pub const DEFAULT_TCP_PORT: u16 = 30001;
pub const DEFAULT_UDP_PORT: u16 = 30002;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct NetConfig {
    pub bind_ip: IpAddr,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub idle_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::from([0, 0, 0, 0]),
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Owns the TCP listener and UDP holepunch socket, and every live
/// connection accepted off them.
pub struct Server {
    tcp_addr: SocketAddr,
    listener: TcpListener,
    udp: Arc<UdpSocket>,
    idle_timeout: Duration,
    dumper: Option<Arc<PacketDumper>>,
    handler: Arc<dyn FrameHandler>,
    live: Arc<Mutex<HashMap<Uuid, Arc<Conn>>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    pub async fn bind(
        config: NetConfig,
        dumper: Option<Arc<PacketDumper>>,
        handler: Arc<dyn FrameHandler>,
    ) -> io::Result<Self> {
        let tcp_addr = SocketAddr::new(config.bind_ip, config.tcp_port);
        let udp_addr = SocketAddr::new(config.bind_ip, config.udp_port);

        let listener = TcpListener::bind(tcp_addr).await?;
        let udp = Arc::new(UdpSocket::bind(udp_addr).await?);

        info!(%tcp_addr, %udp_addr, "master server bound");

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            tcp_addr,
            listener,
            udp,
            idle_timeout: config.idle_timeout,
            dumper,
            handler,
            live: Arc::new(Mutex::new(HashMap::new())),
            shutdown_tx,
        })
    }

    pub fn local_tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawns the accept loop and the UDP echo loop; returns once both
    /// tasks are running. Call `stop` to initiate graceful shutdown.
    pub fn run(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let accept_task = tokio::spawn(Arc::clone(self).accept_loop());
        let udp_task = tokio::spawn(Arc::clone(self).udp_echo_loop());
        (accept_task, udp_task)
    }

    async fn accept_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_receiver();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => self.handle_accept(stream, peer_addr),
                        Err(e) => {
                            warn!(error = %e, "error accepting connection");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    fn handle_accept(self: &Arc<Self>, stream: tokio::net::TcpStream, peer_addr: SocketAddr) {
        let conn = spawn_connection(
            stream,
            peer_addr,
            self.idle_timeout,
            self.dumper.clone(),
            Arc::clone(&self.handler),
        );

        self.live.lock().unwrap().insert(conn.id(), Arc::clone(&conn));

        let live = Arc::clone(&self.live);
        let conn_id = conn.id();
        // A lightweight reaper: once the connection's own tasks finish
        // (socket closed by either side), drop it from the live set so
        // `stop` doesn't try to close an already-dead connection.
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if conn.is_destroyed() {
                    live.lock().unwrap().remove(&conn_id);
                    break;
                }
            }
        });
    }

    async fn udp_echo_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_receiver();
        let mut buf = [0u8; 1500];
        loop {
            tokio::select! {
                received = self.udp.recv_from(&mut buf) => {
                    match received {
                        Ok((_, from)) => {
                            if let Err(e) = self.reply_holepunch(from).await {
                                debug!(error = %e, "failed to send holepunch reply");
                            }
                        }
                        Err(e) => warn!(error = %e, "error receiving holepunch datagram"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Echoes the observed `(ip, port)` back to the sender (spec.md §6):
    /// 4 bytes of IPv4 address followed by a 2-byte LE port.
    async fn reply_holepunch(&self, from: SocketAddr) -> io::Result<()> {
        let mut reply = Vec::with_capacity(6);
        match from.ip() {
            IpAddr::V4(v4) => reply.extend_from_slice(&v4.octets()),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => reply.extend_from_slice(&v4.octets()),
                None => reply.extend_from_slice(&[0, 0, 0, 0]),
            },
        }
        reply.extend_from_slice(&from.port().to_le_bytes());
        self.udp.send_to(&reply, from).await?;
        Ok(())
    }

    /// Flips the shutdown flag, closes every live connection, and waits
    /// briefly for their tasks to unwind (spec.md §4.8 `Stop()`).
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);

        let conns: Vec<Arc<Conn>> = self.live.lock().unwrap().values().cloned().collect();
        for conn in conns {
            conn.close();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        info!("master server stopped");
    }
}
