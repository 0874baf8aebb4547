//! Optional packet-logging sidecar (spec.md §9 "Packet logging", §6
//! "Persisted state layout"). Writes are buffered through a bounded
//! channel and drained by one background task; the hot path uses
//! `try_send` so a full channel drops the dump instead of blocking a
//! connection's write path.

use std::path::PathBuf;

use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

enum Direction {
    In,
    Out,
}

impl Direction {
    fn dir_name(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

struct DumpJob {
    direction: Direction,
    conn_id: Uuid,
    /// The unbounded "real" sequence counter (spec.md §4.1), used only for
    /// filenames so dumps stay ordered even after the wire sequence wraps.
    real_seq: u64,
    packet_id: u8,
    bytes: Vec<u8>,
}

pub struct PacketDumper {
    tx: mpsc::Sender<DumpJob>,
}

impl PacketDumper {
    /// Clears `{base_dir}/in` and `{base_dir}/out`, recreates them, and
    /// spawns the writer task.
    pub async fn start(base_dir: PathBuf) -> std::io::Result<Self> {
        let in_dir = base_dir.join("in");
        let out_dir = base_dir.join("out");

        for dir in [&in_dir, &out_dir] {
            let _ = fs::remove_dir_all(dir).await;
            fs::create_dir_all(dir).await?;
        }

        let (tx, mut rx) = mpsc::channel::<DumpJob>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let dir = match job.direction {
                    Direction::In => &in_dir,
                    Direction::Out => &out_dir,
                };
                let path = dir.join(format!(
                    "{}_{:020}-{}.bin",
                    job.conn_id, job.real_seq, job.packet_id
                ));
                if let Err(e) = fs::write(&path, &job.bytes).await {
                    warn!(?path, error = %e, "failed to write packet dump");
                }
            }
        });

        Ok(Self { tx })
    }

    fn try_dump(&self, direction: Direction, conn_id: Uuid, real_seq: u64, packet_id: u8, bytes: &[u8]) {
        let job = DumpJob {
            direction,
            conn_id,
            real_seq,
            packet_id,
            bytes: bytes.to_vec(),
        };
        if self.tx.try_send(job).is_err() {
            debug!(%conn_id, packet_id, "dropping packet dump, sink is backed up");
        }
    }

    pub fn dump_inbound(&self, conn_id: Uuid, real_seq: u64, packet_id: u8, bytes: &[u8]) {
        self.try_dump(Direction::In, conn_id, real_seq, packet_id, bytes);
    }

    pub fn dump_outbound(&self, conn_id: Uuid, real_seq: u64, packet_id: u8, bytes: &[u8]) {
        self.try_dump(Direction::Out, conn_id, real_seq, packet_id, bytes);
    }
}
