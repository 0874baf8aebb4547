//! The `Favorite` handler's two sub-ops, both opaque JSON passthroughs to
//! `master-userservice` (spec.md §4.7).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_net::Conn;
use master_userservice::UserService;

use crate::ctx::HandlerCtx;
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::wire::{decode_json_payload, FavoriteSubOp};

pub struct FavoriteHandler;

#[async_trait]
impl PacketHandler for FavoriteHandler {
    async fn handle(
        &self,
        ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        mut body: Bytes,
    ) -> Result<(), HandlerError> {
        if body.is_empty() {
            return Err(HandlerError::BadRequest("empty Favorite packet".into()));
        }
        let sub_op_byte = body.split_to(1)[0];
        let sub_op = FavoriteSubOp::from_u8(sub_op_byte).ok_or_else(|| {
            HandlerError::BadRequest(format!("unknown favorite sub-op {sub_op_byte}"))
        })?;
        let session = conn.session().ok_or(HandlerError::Unauthenticated)?;
        let payload = decode_json_payload(&body)?;

        match sub_op {
            FavoriteSubOp::SetLoadout => {
                ctx.userservice
                    .set_loadout_weapon(session.user.id, payload)
                    .await?
            }
            FavoriteSubOp::SetCosmetics => {
                ctx.userservice
                    .set_cosmetic_slot(session.user.id, payload)
                    .await?
            }
        }
        Ok(())
    }
}
