//! Routes decoded frames to a handler keyed by packet id (spec.md §4.7, §9
//! "tagged discriminator + switch"). Unknown ids are logged and dropped
//! rather than closing the connection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_net::{Conn, FrameHandler};
use master_protocol::ClientPacketId;
use tracing::{debug, warn};

use crate::ctx::HandlerCtx;
use crate::error::HandlerError;
use crate::{about_me, achievement, favorite, host, login, option, room};

/// One handler per top-level client packet id.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerCtx, conn: &Arc<Conn>, body: Bytes)
        -> Result<(), HandlerError>;
}

pub struct Dispatcher {
    ctx: Arc<HandlerCtx>,
    handlers: HashMap<u8, Box<dyn PacketHandler>>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<HandlerCtx>) -> Self {
        let mut handlers: HashMap<u8, Box<dyn PacketHandler>> = HashMap::new();
        handlers.insert(ClientPacketId::Login as u8, Box::new(login::LoginHandler));
        handlers.insert(
            ClientPacketId::AboutMe as u8,
            Box::new(about_me::AboutMeHandler),
        );
        handlers.insert(ClientPacketId::Room as u8, Box::new(room::RoomHandler));
        handlers.insert(ClientPacketId::Host as u8, Box::new(host::HostHandler));
        handlers.insert(
            ClientPacketId::Option as u8,
            Box::new(option::OptionHandler),
        );
        handlers.insert(
            ClientPacketId::Favorite as u8,
            Box::new(favorite::FavoriteHandler),
        );
        handlers.insert(
            ClientPacketId::Achievement as u8,
            Box::new(achievement::AchievementHandler),
        );

        Self { ctx, handlers }
    }
}

#[async_trait]
impl FrameHandler for Dispatcher {
    async fn handle_frame(&self, conn: &Arc<Conn>, packet_id: u8, body: Bytes) {
        let Some(handler) = self.handlers.get(&packet_id) else {
            debug!(packet_id, "unknown packet id, dropping");
            return;
        };

        if packet_id != ClientPacketId::Login as u8 && conn.session().is_none() {
            warn!(
                conn_id = %conn.id(),
                packet_id,
                "packet received before login, dropping"
            );
            return;
        }

        if let Err(e) = handler.handle(&self.ctx, conn, body).await {
            debug!(
                conn_id = %conn.id(),
                packet_id,
                error = %e,
                "handler returned an error"
            );
        }
    }

    /// Socket close, either end: deregister from the session registry and
    /// vacate whatever room/channel lobby the session still points at
    /// (spec.md §3 "destroyed on socket close", §4.6 host migration).
    async fn on_disconnect(&self, conn: &Arc<Conn>) {
        let Some(session) = conn.session() else {
            return;
        };

        room::vacate_on_disconnect(&self.ctx, &session, conn.id());
        self.ctx.registry.remove(conn);

        debug!(conn_id = %conn.id(), user_id = session.user.id, "connection disconnected, session torn down");
    }
}
