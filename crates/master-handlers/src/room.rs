//! The `Room` handler and its nested sub-operations (spec.md §4.6, §4.7).
//! Every sub-op ultimately calls one `master-model::Room` method and turns
//! the returned `RoomEvent`s into broadcasts; this module owns no state of
//! its own.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_model::{Channel, ChannelCoords, ModelError, Room, RoomSettings, UserSession};
use master_net::Conn;
use master_protocol::{Decode, ServerPacketId};

use crate::ctx::HandlerCtx;
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::respond::send;
use crate::room_lookup::{current_room, unwrap_or_dialog};
use crate::wire::{
    encode_countdown_tick, encode_empty, encode_host_changed, encode_join_new_room,
    encode_new_player, encode_player_left, encode_ready_changed, encode_room_list,
    encode_room_roster, encode_room_settings, encode_team_changed, team_from_u8,
    EnterChannelRequest, GameStartCountdownRequest, JoinRoomRequest, NewRoomRequest, RoomSubOp,
    SetUserTeamRequest, UpdateSettingsRequest,
};

pub struct RoomHandler;

#[async_trait]
impl PacketHandler for RoomHandler {
    async fn handle(
        &self,
        ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        mut body: Bytes,
    ) -> Result<(), HandlerError> {
        if body.is_empty() {
            return Err(HandlerError::BadRequest("empty Room packet".into()));
        }
        let sub_op_byte = body.split_to(1)[0];
        let sub_op = RoomSubOp::from_u8(sub_op_byte)
            .ok_or_else(|| HandlerError::BadRequest(format!("unknown room sub-op {sub_op_byte}")))?;
        let session = conn.session().ok_or(HandlerError::Unauthenticated)?;

        match sub_op {
            RoomSubOp::EnterChannel => enter_channel(ctx, conn, &session, &body),
            RoomSubOp::NewRoom => new_room(ctx, conn, &session, &body),
            RoomSubOp::JoinRoom => join_room(ctx, conn, &session, &body),
            RoomSubOp::LeaveRoom => {
                leave_current_room(ctx, &session);
                Ok(())
            }
            RoomSubOp::ToggleReady => {
                let Some((channel, room)) = unwrap_or_dialog(conn, current_room(ctx, &session))
                else {
                    return Ok(());
                };
                if let Some(events) =
                    unwrap_or_dialog(conn, room.toggle_ready(session.user.id))
                {
                    broadcast_room_events(ctx, channel, &room, &events);
                }
                Ok(())
            }
            RoomSubOp::UpdateSettings => update_settings(ctx, conn, &session, &body),
            RoomSubOp::SetUserTeam => set_user_team(ctx, conn, &session, &body),
            RoomSubOp::GameStartCountdown => game_start_countdown(ctx, conn, &session, &body),
            RoomSubOp::GameStart => {
                let Some((channel, room)) = unwrap_or_dialog(conn, current_room(ctx, &session))
                else {
                    return Ok(());
                };
                if let Some(events) = unwrap_or_dialog(conn, room.start_game(session.user.id)) {
                    broadcast_room_events(ctx, channel, &room, &events);
                }
                Ok(())
            }
            RoomSubOp::CloseResultWindow => {
                let Some((_channel, room)) = unwrap_or_dialog(conn, current_room(ctx, &session))
                else {
                    return Ok(());
                };
                unwrap_or_dialog(conn, room.close_result_window(session.user.id));
                Ok(())
            }
        }
    }
}

/// `SendRoomListTo(conn, channel)` (spec.md §4.6 "Directory"): moves the
/// requester's lobby membership to the selected channel and sends a room
/// list snapshot. Leaves any previously-selected channel's lobby first so a
/// connection is never counted as "in lobby" in two channels at once.
fn enter_channel(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = EnterChannelRequest::decode(&mut r)?;

    let Some(channel) = unwrap_or_dialog(
        conn,
        ctx.directory
            .get_channel(req.server_index as usize, req.channel_index as usize),
    ) else {
        return Ok(());
    };

    leave_channel_lobby(ctx, session, conn.id());

    session.set_channel(ChannelCoords {
        server_index: req.server_index as usize,
        channel_index: req.channel_index as usize,
    });
    channel.join_lobby(conn.id());

    send(
        conn,
        ServerPacketId::RoomList,
        encode_room_list(&channel.room_list()),
    );
    Ok(())
}

/// Removes `conn_id` from whatever channel lobby the session last pointed
/// at. Shared by `enter_channel` (moving between channels) and disconnect
/// cleanup.
pub(crate) fn leave_channel_lobby(ctx: &HandlerCtx, session: &UserSession, conn_id: uuid::Uuid) {
    let Some(coords) = session.current_channel() else {
        return;
    };
    if let Ok(channel) = ctx
        .directory
        .get_channel(coords.server_index, coords.channel_index)
    {
        channel.leave_lobby(conn_id);
    }
}

fn new_room(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = NewRoomRequest::decode(&mut r)?;

    let Some(channel) = unwrap_or_dialog(
        conn,
        ctx.directory
            .get_channel(req.server_index as usize, req.channel_index as usize),
    ) else {
        return Ok(());
    };

    leave_current_room(ctx, session);

    let settings = RoomSettings {
        name: req.name.to_string(),
        password: req.password.to_string(),
        map: req.map,
        mode: req.mode,
        kill_limit: req.kill_limit,
        win_limit: req.win_limit,
        bots_enabled: req.bots_enabled,
    };
    if unwrap_or_dialog(conn, settings.validate()).is_none() {
        return Ok(());
    }

    let room = channel.create_room(session.user.id, conn.id(), settings);
    session.set_channel(ChannelCoords {
        server_index: req.server_index as usize,
        channel_index: req.channel_index as usize,
    });
    session.set_room(room.id);
    channel.leave_lobby(conn.id());

    send(conn, ServerPacketId::JoinNewRoom, encode_join_new_room(room.id));
    send(
        conn,
        ServerPacketId::RoomSettings,
        encode_room_settings(
            room.id,
            room.host(),
            room.status(),
            room.countdown_value(),
            &room.settings(),
        ),
    );
    refresh_room_list(ctx, channel);
    Ok(())
}

fn join_room(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = JoinRoomRequest::decode(&mut r)?;

    let Some(channel) = unwrap_or_dialog(
        conn,
        ctx.directory
            .get_channel(req.server_index as usize, req.channel_index as usize),
    ) else {
        return Ok(());
    };

    let Some(room) = unwrap_or_dialog(
        conn,
        channel.get_room(req.room_id).ok_or(ModelError::NoSuchRoom),
    ) else {
        return Ok(());
    };

    let previous_room = session.current_room();
    let Some(events) = unwrap_or_dialog(
        conn,
        room.join(session.user.id, conn.id(), &req.password),
    ) else {
        return Ok(());
    };

    if previous_room != Some(room.id) {
        leave_current_room(ctx, session);
    }

    session.set_channel(ChannelCoords {
        server_index: req.server_index as usize,
        channel_index: req.channel_index as usize,
    });
    session.set_room(room.id);
    channel.leave_lobby(conn.id());

    send(conn, ServerPacketId::JoinNewRoom, encode_join_new_room(room.id));
    send(
        conn,
        ServerPacketId::RoomSettings,
        encode_room_settings(
            room.id,
            room.host(),
            room.status(),
            room.countdown_value(),
            &room.settings(),
        ),
    );
    send(
        conn,
        ServerPacketId::RoomRoster,
        encode_room_roster(&room.occupants()),
    );
    broadcast_room_events(ctx, channel, &room, &events);
    Ok(())
}

fn update_settings(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = UpdateSettingsRequest::decode(&mut r)?;

    let Some((channel, room)) = unwrap_or_dialog(conn, current_room(ctx, session)) else {
        return Ok(());
    };

    let settings = RoomSettings {
        name: req.name.to_string(),
        password: req.password.to_string(),
        map: req.map,
        mode: req.mode,
        kill_limit: req.kill_limit,
        win_limit: req.win_limit,
        bots_enabled: req.bots_enabled,
    };

    if let Some(events) = unwrap_or_dialog(conn, room.update_settings(session.user.id, settings)) {
        broadcast_room_events(ctx, channel, &room, &events);
    }
    Ok(())
}

fn set_user_team(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = SetUserTeamRequest::decode(&mut r)?;
    let Some(team) = team_from_u8(req.team) else {
        return Err(HandlerError::BadRequest(format!("bad team id {}", req.team)));
    };

    let Some((channel, room)) = unwrap_or_dialog(conn, current_room(ctx, session)) else {
        return Ok(());
    };

    if let Some(events) =
        unwrap_or_dialog(conn, room.set_user_team(session.user.id, req.target_user_id, team))
    {
        broadcast_room_events(ctx, channel, &room, &events);
    }
    Ok(())
}

fn game_start_countdown(
    ctx: &HandlerCtx,
    conn: &Conn,
    session: &UserSession,
    body: &[u8],
) -> Result<(), HandlerError> {
    let mut r = body;
    let req = GameStartCountdownRequest::decode(&mut r)?;

    let Some((channel, room)) = unwrap_or_dialog(conn, current_room(ctx, session)) else {
        return Ok(());
    };

    if let Some(events) = unwrap_or_dialog(
        conn,
        room.set_countdown(session.user.id, req.should_count, req.count),
    ) {
        broadcast_room_events(ctx, channel, &room, &events);
    }
    Ok(())
}

/// Vacates whatever room the session currently points at, if any
/// (`NewRoomRequest`/`JoinRoomRequest`: "if already in a room, vacate it").
pub(crate) fn leave_current_room(ctx: &HandlerCtx, session: &UserSession) {
    let Some(coords) = session.current_channel() else {
        return;
    };
    let Some(room_id) = session.current_room() else {
        return;
    };
    let Ok(channel) = ctx
        .directory
        .get_channel(coords.server_index, coords.channel_index)
    else {
        session.clear_room();
        return;
    };
    let Some(room) = channel.get_room(room_id) else {
        session.clear_room();
        return;
    };

    if let Ok(events) = room.leave(session.user.id) {
        if room.status() == master_model::RoomStatus::Closed {
            channel.remove_room(room.id);
        }
        broadcast_room_events(ctx, channel, &room, &events);
    }
    session.clear_room();
}

/// Full session teardown on disconnect: vacate any room (with host
/// migration/closure broadcasts), then leave the channel lobby set
/// (spec.md §3 "Lifecycle": "destroyed on socket close").
pub(crate) fn vacate_on_disconnect(ctx: &HandlerCtx, session: &UserSession, conn_id: uuid::Uuid) {
    leave_current_room(ctx, session);
    leave_channel_lobby(ctx, session, conn_id);
    session.clear_channel();
}

fn broadcast_room_events(ctx: &HandlerCtx, channel: &Channel, room: &Room, events: &[master_model::RoomEvent]) {
    use master_model::RoomEvent;

    for event in events {
        match event {
            RoomEvent::Joined { user_id, .. } => {
                if let Some(conn) = ctx.registry.find_by_owner_id(*user_id) {
                    if let Some(session) = conn.session() {
                        broadcast_to_room_except(
                            ctx,
                            room,
                            *user_id,
                            ServerPacketId::NewPlayer,
                            encode_new_player(*user_id, &session.user.playername),
                        );
                    }
                }
                refresh_room_list(ctx, channel);
            }
            RoomEvent::Left { user_id } => {
                broadcast_to_room(ctx, room, ServerPacketId::PlayerLeft, encode_player_left(*user_id));
                refresh_room_list(ctx, channel);
            }
            RoomEvent::HostChanged { new_host } => {
                broadcast_to_room(
                    ctx,
                    room,
                    ServerPacketId::HostChanged,
                    encode_host_changed(*new_host),
                );
            }
            RoomEvent::Closed => {
                refresh_room_list(ctx, channel);
            }
            RoomEvent::ReadyChanged { user_id, ready } => {
                broadcast_to_room(
                    ctx,
                    room,
                    ServerPacketId::ReadyChanged,
                    encode_ready_changed(*user_id, *ready),
                );
            }
            RoomEvent::SettingsChanged => {
                let settings = room.settings();
                broadcast_to_room(
                    ctx,
                    room,
                    ServerPacketId::RoomSettings,
                    encode_room_settings(
                        room.id,
                        room.host(),
                        room.status(),
                        room.countdown_value(),
                        &settings,
                    ),
                );
            }
            RoomEvent::TeamChanged { user_id, team } => {
                broadcast_to_room(
                    ctx,
                    room,
                    ServerPacketId::TeamChanged,
                    encode_team_changed(*user_id, *team),
                );
            }
            RoomEvent::CountdownTick { value } => {
                broadcast_to_room(
                    ctx,
                    room,
                    ServerPacketId::CountdownTick,
                    encode_countdown_tick(*value),
                );
            }
            RoomEvent::CountdownCancelled => {
                broadcast_to_room(ctx, room, ServerPacketId::CountdownCancelled, encode_empty());
            }
            RoomEvent::GameStarted => {
                broadcast_to_room(ctx, room, ServerPacketId::GameStarted, encode_empty());
            }
            RoomEvent::GameEnded => {
                broadcast_to_room(ctx, room, ServerPacketId::GameEnded, encode_empty());
            }
        }
    }
}

fn broadcast_to_room(ctx: &HandlerCtx, room: &Room, id: ServerPacketId, body: Bytes) {
    for (user_id, _conn_id, _ready, _team) in room.occupants() {
        if let Some(conn) = ctx.registry.find_by_owner_id(user_id) {
            send(&conn, id, body.clone());
        }
    }
}

/// Like `broadcast_to_room`, but skips `except_user_id` (spec.md §4.6's
/// `JoinRoomRequest` row: "send new-player to others").
fn broadcast_to_room_except(ctx: &HandlerCtx, room: &Room, except_user_id: u64, id: ServerPacketId, body: Bytes) {
    for (user_id, _conn_id, _ready, _team) in room.occupants() {
        if user_id == except_user_id {
            continue;
        }
        if let Some(conn) = ctx.registry.find_by_owner_id(user_id) {
            send(&conn, id, body.clone());
        }
    }
}

/// Per spec.md §5: clones the lobby member list under the channel's read
/// lock (inside `lobby_members`), then sends with the lock already dropped.
fn refresh_room_list(ctx: &HandlerCtx, channel: &Channel) {
    let body = encode_room_list(&channel.room_list());
    for conn_id in channel.lobby_members() {
        if let Some(conn) = ctx.registry.find_by_conn_id(conn_id) {
            send(&conn, ServerPacketId::RoomList, body.clone());
        }
    }
}
