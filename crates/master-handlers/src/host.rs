//! The `Host` handler: `OnGameEnd` mutates the room model directly; the
//! remaining sub-ops (`SetInventory`, `SetLoadout`, `SetBuyMenu`,
//! `TeamChanging`, `ItemUsing`) are host-authority relays that never
//! interpret their payload, only forward it to the resolved target
//! connection (spec.md §4.7 "Host-authority handlers").

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use master_model::ModelError;
use master_net::Conn;
use master_protocol::ServerPacketId;
use tracing::debug;

use crate::ctx::HandlerCtx;
use crate::dialogs::{GAME_NOT_HOST, GAME_TARGET_NOT_FOUND, GAME_WRONG_STATUS};
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::respond::{send, send_dialog};
use crate::wire::{encode_empty, HostForwardRequest, HostSubOp};

pub struct HostHandler;

#[async_trait]
impl PacketHandler for HostHandler {
    async fn handle(
        &self,
        ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        mut body: Bytes,
    ) -> Result<(), HandlerError> {
        if body.is_empty() {
            return Err(HandlerError::BadRequest("empty Host packet".into()));
        }
        let sub_op_byte = body.split_to(1)[0];
        let sub_op = HostSubOp::from_u8(sub_op_byte)
            .ok_or_else(|| HandlerError::BadRequest(format!("unknown host sub-op {sub_op_byte}")))?;

        let session = conn.session().ok_or(HandlerError::Unauthenticated)?;

        let room = match crate::room_lookup::current_room(ctx, &session) {
            Ok(pair) => pair.1,
            Err(e) => {
                send_dialog(conn, crate::room_lookup::dialog_for(&e));
                return Ok(());
            }
        };

        if room.host() != session.user.id {
            send_dialog(conn, GAME_NOT_HOST);
            return Err(HandlerError::NotHost);
        }

        if sub_op == HostSubOp::OnGameEnd {
            match room.end_game(session.user.id) {
                Ok(_events) => {
                    for (user_id, ..) in room.occupants() {
                        if let Some(target) = ctx.registry.find_by_owner_id(user_id) {
                            send(&target, ServerPacketId::GameEnded, encode_empty());
                        }
                    }
                }
                Err(ModelError::WrongStatus) => send_dialog(conn, GAME_WRONG_STATUS),
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        let req = HostForwardRequest::decode(&body)?;
        let Some(target) = ctx.registry.find_by_owner_id(req.target_user_id) else {
            send_dialog(conn, GAME_TARGET_NOT_FOUND);
            return Err(HandlerError::TargetNotFound);
        };

        let mut forwarded = BytesMut::with_capacity(1 + req.payload.len());
        forwarded.put_u8(sub_op_byte);
        forwarded.extend_from_slice(&req.payload);

        send(&target, ServerPacketId::HostForward, forwarded.freeze());
        debug!(
            conn_id = %conn.id(),
            target_user_id = req.target_user_id,
            sub_op = sub_op_byte,
            "forwarded host packet"
        );
        Ok(())
    }
}
