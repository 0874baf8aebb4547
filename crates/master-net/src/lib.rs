//! Connection handling and the server instance (spec.md §1 items 1 and 4).

pub mod conn;
pub mod dumper;
pub mod error;
pub mod server;

pub use conn::{spawn_connection, Conn, FrameHandler};
pub use dumper::PacketDumper;
pub use error::ConnError;
pub use server::{NetConfig, Server, DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};
