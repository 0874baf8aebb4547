//! Small send helpers shared by every handler: cast a `ServerPacketId` and
//! swallow `ConnectionClosed` with a warning rather than propagating it
//! (spec.md §7 "ConnectionClosed ... swallow with warning").

use bytes::Bytes;
use master_net::Conn;
use master_protocol::ServerPacketId;
use tracing::warn;

use crate::wire::encode_system_dialog;

pub fn send(conn: &Conn, id: ServerPacketId, body: Bytes) {
    if let Err(e) = conn.send(id as u8, &body) {
        warn!(conn_id = %conn.id(), error = %e, "send failed, connection likely closed");
    }
}

pub fn send_dialog(conn: &Conn, message: &str) {
    send(conn, ServerPacketId::SystemDialog, encode_system_dialog(message));
}
