use thiserror::Error;

/// spec.md §7's `ConnectionClosed` kind plus framing failures bubbled up
/// from `master-protocol`.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("connection is closed")]
    Closed,

    #[error(transparent)]
    Codec(#[from] master_protocol::CodecError),
}
