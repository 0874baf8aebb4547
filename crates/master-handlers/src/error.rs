use master_model::ModelError;
use master_net::ConnError;
use master_protocol::CodecError;
use master_userservice::UserServiceError;
use thiserror::Error;

/// spec.md §7's error kinds as they land in a packet handler. Every variant
/// except `Codec`/`Conn` is non-fatal: the dispatcher logs and, where a
/// dialog applies, the handler itself has already queued one before
/// returning `Err`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("packet received before login")]
    Unauthenticated,

    #[error("malformed packet body: {0}")]
    BadRequest(String),

    #[error("requester is not the room host")]
    NotHost,

    #[error("target user is not connected")]
    TargetNotFound,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    UserService(#[from] UserServiceError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Conn(#[from] ConnError),
}
