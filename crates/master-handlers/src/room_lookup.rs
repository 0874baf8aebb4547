//! Shared "resolve the requester's current room" plumbing, used by both the
//! `Room` handler (which mutates rooms) and the `Host` handler (which only
//! needs to confirm host authority before relaying a packet).

use master_model::{Channel, ModelError, Room, UserSession};
use master_net::Conn;
use tracing::debug;

use crate::dialogs::*;
use crate::ctx::HandlerCtx;
use crate::respond::send_dialog;

/// Resolves the requester's current `(Channel, Room)` pair from session
/// state, as a `ModelError` so callers can route it through the same
/// dialog-sending path as a model-level rejection.
pub(crate) fn current_room<'a>(
    ctx: &'a HandlerCtx,
    session: &UserSession,
) -> Result<(&'a Channel, std::sync::Arc<Room>), ModelError> {
    let coords = session.current_channel().ok_or(ModelError::NotOccupant)?;
    let channel = ctx
        .directory
        .get_channel(coords.server_index, coords.channel_index)?;
    let room_id = session.current_room().ok_or(ModelError::NotOccupant)?;
    let room = channel.get_room(room_id).ok_or(ModelError::NoSuchRoom)?;
    Ok((channel, room))
}

pub(crate) fn unwrap_or_dialog<T>(conn: &Conn, result: Result<T, ModelError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(conn_id = %conn.id(), error = %e, "room operation rejected");
            send_dialog(conn, dialog_for(&e));
            None
        }
    }
}

pub(crate) fn dialog_for(e: &ModelError) -> &'static str {
    match e {
        ModelError::NoSuchServer => GAME_NO_SUCH_SERVER,
        ModelError::NoSuchChannel => GAME_NO_SUCH_CHANNEL,
        ModelError::NoSuchRoom => GAME_NO_SUCH_ROOM,
        ModelError::RoomFull => GAME_ROOM_FULL,
        ModelError::RoomClosed => GAME_ROOM_CLOSED,
        ModelError::BadPassword => GAME_BAD_ROOM_PASSWORD,
        ModelError::NotOccupant => GAME_NOT_OCCUPANT,
        ModelError::AlreadyInRoom => GAME_NOT_OCCUPANT,
        ModelError::NotHost => GAME_NOT_HOST,
        ModelError::WrongStatus => GAME_WRONG_STATUS,
        ModelError::CannotStartGame => GAME_CANNOT_START,
        ModelError::BadSettings(_) => GAME_BAD_SETTINGS,
        ModelError::TargetNotFound => GAME_TARGET_NOT_FOUND,
    }
}
