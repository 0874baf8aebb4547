//! `AboutMe`: re-sends the caller's own `FullUserUpdate`. Cheap because the
//! session already holds the cached `User` record from login; no upstream
//! round-trip needed.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_net::Conn;
use master_protocol::ServerPacketId;

use crate::ctx::HandlerCtx;
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::respond::send;
use crate::wire::encode_full_user_update;

pub struct AboutMeHandler;

#[async_trait]
impl PacketHandler for AboutMeHandler {
    async fn handle(
        &self,
        _ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        _body: Bytes,
    ) -> Result<(), HandlerError> {
        let session = conn.session().ok_or(HandlerError::Unauthenticated)?;
        send(
            conn,
            ServerPacketId::FullUserUpdate,
            encode_full_user_update(
                session.user.id,
                &session.user.username,
                &session.user.playername,
            ),
        );
        Ok(())
    }
}
