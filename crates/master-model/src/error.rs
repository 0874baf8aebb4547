use thiserror::Error;

/// spec.md §7's `InvariantViolation`/`NotFound` kinds as they occur against
/// the channel/room model. Every variant is non-fatal to the connection:
/// handlers translate these into a `GAME_*` dialog packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("no such channel server")]
    NoSuchServer,

    #[error("no such channel")]
    NoSuchChannel,

    #[error("no such room")]
    NoSuchRoom,

    #[error("room is full")]
    RoomFull,

    #[error("room is closed")]
    RoomClosed,

    #[error("incorrect room password")]
    BadPassword,

    #[error("user is not an occupant of this room")]
    NotOccupant,

    #[error("user is already in a room")]
    AlreadyInRoom,

    #[error("requester is not the room host")]
    NotHost,

    #[error("room is not in a state that permits this operation")]
    WrongStatus,

    #[error("cannot start a game with empty teams and bots disabled")]
    CannotStartGame,

    #[error("settings value rejected: {0}")]
    BadSettings(String),

    #[error("target user not found")]
    TargetNotFound,
}
