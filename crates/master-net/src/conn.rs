//! `Conn`: one socket, its session pointer, sequence state, and a
//! serialized write lane (spec.md §3 "Connection", §4.2).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use master_model::UserSession;
use master_protocol::{Frame, FrameDecoder, FrameEncoder, SequenceCounter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dumper::PacketDumper;
use crate::error::ConnError;

const READ_BUF_SIZE: usize = 4096;

/// Receives decoded frames off a `Conn`'s reader task. Kept as a trait
/// (rather than a direct dependency on the dispatcher) so this crate never
/// needs to depend on `master-handlers` — the "tagged discriminator, not ad
/// hoc polymorphism" dispatch of spec.md §9 still lives one layer up, this
/// is just the seam it plugs into, the same way the teacher's
/// `ClientConnection` trait keeps `packet_io.rs` free of client-bundle
/// internals.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle_frame(&self, conn: &Arc<Conn>, packet_id: u8, body: Bytes);

    /// Called once the reader loop exits, just before the connection is
    /// closed, so a handler can vacate whatever room/lobby the session
    /// still points at (spec.md §4.6 "on host disconnect or leave").
    async fn on_disconnect(&self, _conn: &Arc<Conn>) {}
}

struct SendState {
    encoder: FrameEncoder,
    seq: SequenceCounter,
}

pub struct Conn {
    id: Uuid,
    peer_addr: SocketAddr,
    session: Mutex<Option<Arc<UserSession>>>,
    inbound_seq: Mutex<SequenceCounter>,
    send: Mutex<SendState>,
    outbound_tx: flume::Sender<Bytes>,
    destroyed: AtomicBool,
    dumper: Option<Arc<PacketDumper>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Conn {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn session(&self) -> Option<Arc<UserSession>> {
        self.session.lock().unwrap().clone()
    }

    pub fn attach_session(&self, session: Arc<UserSession>) {
        *self.session.lock().unwrap() = Some(session);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Encodes and queues one outbound packet. All sends serialize through
    /// `self.send`, so the sequence byte stamped into the frame equals the
    /// connection's actual order on the wire (spec.md §4.2).
    pub fn send(&self, packet_id: u8, body: &[u8]) -> Result<(), ConnError> {
        if self.is_destroyed() {
            return Err(ConnError::Closed);
        }

        let (bytes, real_seq) = {
            let mut state = self.send.lock().unwrap();
            state.encoder.begin_packet(packet_id);
            state.encoder.append_bytes(body);
            let seq = state.seq.next();
            let bytes = state.encoder.finish_packet(seq)?;
            (bytes, state.seq.real())
        };

        if let Some(dumper) = &self.dumper {
            dumper.dump_outbound(self.id, real_seq, packet_id, &bytes);
        }

        self.outbound_tx.send(bytes).map_err(|_| ConnError::Closed)
    }

    /// Bypasses encoding for a pre-built buffer (spec.md §4.2 `SendRaw`).
    pub fn send_raw(&self, bytes: Bytes) -> Result<(), ConnError> {
        if self.is_destroyed() {
            return Err(ConnError::Closed);
        }
        self.outbound_tx.send(bytes).map_err(|_| ConnError::Closed)
    }

    pub fn close(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.writer_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.reader_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

/// Accepts a freshly-connected socket, splits it into a reader task and a
/// writer task, and returns the shared `Conn` handle.
///
/// Mirrors the teacher's `PacketIo::into_client_args` reader/writer task
/// split in `valence_network::packet_io`: one task owns the read half and
/// decodes frames, one owns the write half and drains an outbound channel,
/// and nothing else touches the raw socket.
pub fn spawn_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    idle_timeout: Duration,
    dumper: Option<Arc<PacketDumper>>,
    handler: Arc<dyn FrameHandler>,
) -> Arc<Conn> {
    let id = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = flume::unbounded::<Bytes>();
    let (read_half, write_half) = stream.into_split();

    let conn = Arc::new(Conn {
        id,
        peer_addr,
        session: Mutex::new(None),
        inbound_seq: Mutex::new(SequenceCounter::new()),
        send: Mutex::new(SendState {
            encoder: FrameEncoder::new(),
            seq: SequenceCounter::new(),
        }),
        outbound_tx,
        destroyed: AtomicBool::new(false),
        dumper,
        reader_task: Mutex::new(None),
        writer_task: Mutex::new(None),
    });

    let writer_task = tokio::spawn(run_writer(write_half, outbound_rx));
    let reader_task = tokio::spawn(run_reader(
        Arc::clone(&conn),
        read_half,
        idle_timeout,
        handler,
    ));

    *conn.writer_task.lock().unwrap() = Some(writer_task);
    *conn.reader_task.lock().unwrap() = Some(reader_task);

    conn
}

async fn run_writer(mut write_half: OwnedWriteHalf, outbound_rx: flume::Receiver<Bytes>) {
    while let Ok(bytes) = outbound_rx.recv_async().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            debug!(error = %e, "error writing frame to socket");
            break;
        }
    }
}

async fn run_reader(
    conn: Arc<Conn>,
    mut read_half: OwnedReadHalf,
    idle_timeout: Duration,
    handler: Arc<dyn FrameHandler>,
) {
    let mut decoder = FrameDecoder::new();

    loop {
        let frame = match decoder.try_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                decoder.reserve(READ_BUF_SIZE);
                let mut buf = decoder.take_capacity();

                let read = tokio::time::timeout(idle_timeout, read_half.read_buf(&mut buf)).await;
                match read {
                    Ok(Ok(0)) => break,
                    Ok(Ok(_)) => {
                        decoder.queue_bytes(buf);
                        continue;
                    }
                    Ok(Err(e)) => {
                        debug!(error = %e, "error reading from socket");
                        break;
                    }
                    Err(_) => {
                        warn!(conn_id = %conn.id(), "connection idle timeout, closing");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(conn_id = %conn.id(), error = %e, "malformed frame, closing connection");
                break;
            }
        };

        handle_decoded_frame(&conn, frame, &handler).await;
    }

    handler.on_disconnect(&conn).await;
    conn.close();
}

async fn handle_decoded_frame(conn: &Arc<Conn>, frame: Frame, handler: &Arc<dyn FrameHandler>) {
    let real_seq = {
        let mut seq = conn.inbound_seq.lock().unwrap();
        seq.next();
        seq.real()
    };

    if let Some(dumper) = &conn.dumper {
        dumper.dump_inbound(conn.id(), real_seq, frame.packet_id, &frame.body);
    }

    handler.handle_frame(conn, frame.packet_id, frame.body).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler {
        count: AtomicUsize,
    }

    #[async_trait]
    impl FrameHandler for CountingHandler {
        async fn handle_frame(&self, _conn: &Arc<Conn>, _packet_id: u8, _body: Bytes) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sends_produce_contiguous_sequence_bytes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect_task = tokio::spawn(TcpStream::connect(addr));
        let (server_stream, peer_addr) = listener.accept().await.unwrap();
        let mut client_stream = connect_task.await.unwrap().unwrap();

        let handler: Arc<dyn FrameHandler> = Arc::new(CountingHandler {
            count: AtomicUsize::new(0),
        });
        let conn = spawn_connection(
            server_stream,
            peer_addr,
            Duration::from_secs(120),
            None,
            handler,
        );

        for _ in 0..257 {
            conn.send(1, b"x").unwrap();
        }

        let mut observed = Vec::new();
        let mut buf = vec![0u8; 4096];
        let mut total_read = 0usize;
        let expected_total = 257 * (4 + 2); // header(4) + packet_id + 1 body byte
        while total_read < expected_total {
            let n = client_stream.read(&mut buf[total_read..]).await.unwrap();
            assert!(n > 0);
            total_read += n;
        }

        let mut i = 0;
        while i < total_read {
            observed.push(buf[i + 1]);
            let body_len = u16::from_le_bytes([buf[i + 2], buf[i + 3]]) as usize;
            i += 4 + body_len;
        }

        assert_eq!(observed.len(), 257);
        assert_eq!(observed[0], 0);
        assert_eq!(observed[255], 255);
        assert_eq!(observed[256], 0);
    }
}
