//! The `Achievement` handler: re-sends the same stub blob issued at login
//! (spec.md §4.7, §6 "achievements are out of scope beyond a stub reply").

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_net::Conn;
use master_protocol::ServerPacketId;
use master_userservice::ACHIEVEMENTS_STUB;

use crate::ctx::HandlerCtx;
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::respond::send;

pub struct AchievementHandler;

#[async_trait]
impl PacketHandler for AchievementHandler {
    async fn handle(
        &self,
        _ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        _body: Bytes,
    ) -> Result<(), HandlerError> {
        conn.session().ok_or(HandlerError::Unauthenticated)?;
        send(
            conn,
            ServerPacketId::AchievementBlob,
            Bytes::from_static(ACHIEVEMENTS_STUB),
        );
        Ok(())
    }
}
