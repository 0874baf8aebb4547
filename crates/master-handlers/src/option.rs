//! The `Option` handler. Only `SetBuyMenu` is in the handler set (spec.md
//! §4.7); the opaque JSON payload is handed to `master-userservice` untouched.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_net::Conn;
use master_userservice::UserService;

use crate::ctx::HandlerCtx;
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::wire::decode_json_payload;

pub struct OptionHandler;

#[async_trait]
impl PacketHandler for OptionHandler {
    async fn handle(
        &self,
        ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        body: Bytes,
    ) -> Result<(), HandlerError> {
        let session = conn.session().ok_or(HandlerError::Unauthenticated)?;
        let payload = decode_json_payload(&body)?;
        ctx.userservice.set_buy_menu(session.user.id, payload).await?;
        Ok(())
    }
}
