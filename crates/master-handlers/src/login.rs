//! The `Login` handler (spec.md §4.7). On success, sends the fixed
//! post-login sequence in order: `UserStart`, the opaque achievements blob,
//! `FullUserUpdate`, the inventory/cosmetics/loadout/buy-menu bundle, then
//! the channel list (spec.md §8 scenario 1).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use master_model::UserSession;
use master_net::Conn;
use master_protocol::ServerPacketId;
use master_userservice::{LoginOutcome, UserService, UserServiceError, ACHIEVEMENTS_STUB};
use tracing::debug;

use crate::ctx::HandlerCtx;
use crate::dialogs::{GAME_BAD_PASSWORD, GAME_BAD_USERNAME, GAME_INVALID_USER_INFO, GAME_UPSTREAM_UNAVAILABLE};
use crate::dispatcher::PacketHandler;
use crate::error::HandlerError;
use crate::respond::{send, send_dialog};
use crate::wire::{decode_body, encode_channel_list, encode_full_user_update, encode_inventory_bundle, encode_user_start, LoginRequest};

pub struct LoginHandler;

#[async_trait]
impl PacketHandler for LoginHandler {
    async fn handle(
        &self,
        ctx: &HandlerCtx,
        conn: &Arc<Conn>,
        body: Bytes,
    ) -> Result<(), HandlerError> {
        let req: LoginRequest = decode_body(&body)?;

        let outcome = match ctx.userservice.login(&req.username, &req.password).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(fail_upstream(ctx, conn, e).await),
        };

        let user_id = match outcome {
            LoginOutcome::NoSuchUser => {
                send_dialog(conn, GAME_BAD_USERNAME);
                return Ok(());
            }
            LoginOutcome::BadPassword => {
                send_dialog(conn, GAME_BAD_PASSWORD);
                return Ok(());
            }
            LoginOutcome::Success(id) => id,
        };

        let user = match ctx.userservice.get_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                send_dialog(conn, GAME_INVALID_USER_INFO);
                return Ok(());
            }
            Err(e) => return Err(fail_upstream(ctx, conn, e).await),
        };

        let session = Arc::new(UserSession::new(user.clone(), conn.peer_addr()));
        conn.attach_session(session);
        ctx.registry.add(Arc::clone(conn));

        send(
            conn,
            ServerPacketId::UserStart,
            encode_user_start(
                user.id,
                &user.username,
                &user.playername,
                master_net::DEFAULT_UDP_PORT,
            ),
        );
        send(
            conn,
            ServerPacketId::AchievementBlob,
            Bytes::from_static(ACHIEVEMENTS_STUB),
        );
        send(
            conn,
            ServerPacketId::FullUserUpdate,
            encode_full_user_update(user.id, &user.username, &user.playername),
        );

        let inventory = ctx.userservice.get_inventory(user.id).await;
        let cosmetics = ctx.userservice.get_cosmetics(user.id).await;
        let loadouts = ctx.userservice.get_loadouts(user.id).await;
        let buy_menu = ctx.userservice.get_buy_menu(user.id).await;
        match (inventory, cosmetics, loadouts, buy_menu) {
            (Ok(inventory), Ok(cosmetics), Ok(loadouts), Ok(buy_menu)) => send(
                conn,
                ServerPacketId::InventoryBundle,
                encode_inventory_bundle(&inventory, &cosmetics, &loadouts, &buy_menu),
            ),
            (Err(e), ..) | (_, Err(e), ..) | (_, _, Err(e), _) | (_, _, _, Err(e)) => {
                return Err(fail_upstream(ctx, conn, e).await)
            }
        }

        send(
            conn,
            ServerPacketId::ChannelList,
            encode_channel_list(&ctx.directory.channel_list()),
        );

        debug!(conn_id = %conn.id(), user_id = user.id, "login complete");
        Ok(())
    }
}

async fn fail_upstream(ctx: &HandlerCtx, conn: &Conn, e: UserServiceError) -> HandlerError {
    if e.is_transport_failure() {
        ctx.probe.check_now().await;
    }
    send_dialog(conn, GAME_UPSTREAM_UNAVAILABLE);
    e.into()
}
