//! End-to-end scenarios driven over real loopback sockets: a fake upstream
//! user service stands in for the HTTP backend, `Dispatcher` is wired up
//! exactly as `master-server`'s composition root wires it, and each test
//! writes/reads real framed bytes through `spawn_connection` the same way
//! `master-net::conn`'s own socket test does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use master_handlers::{Dispatcher, HandlerCtx};
use master_model::{ChannelDirectory, ChannelServer, RoomStatus};
use master_net::{spawn_connection, Conn, FrameHandler};
use master_protocol::{
    ClientPacketId, Decode, Encode, Frame, FrameDecoder, FrameEncoder, PacketString,
    ServerPacketId,
};
use master_registry::SessionRegistry;
use master_userservice::{LoginOutcome, OpaqueBundle, Probe, User, UserId, UserService, UserServiceError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ---- Room sub-operation byte values, mirrored from `master_handlers::wire::RoomSubOp`
// (private to that crate; a test crate links only the public API) ----
const SUBOP_NEW_ROOM: u8 = 0;
const SUBOP_JOIN_ROOM: u8 = 1;
const SUBOP_SET_USER_TEAM: u8 = 5;
const SUBOP_GAME_START_COUNTDOWN: u8 = 6;
const SUBOP_GAME_START: u8 = 7;

struct FakeUserService {
    users: Mutex<HashMap<String, (User, String)>>,
    fail_get_by_id: AtomicBool,
    fail_session_count: AtomicBool,
}

impl FakeUserService {
    fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            fail_get_by_id: AtomicBool::new(false),
            fail_session_count: AtomicBool::new(false),
        }
    }

    fn add_user(&self, username: &str, password: &str, id: u64, playername: &str) {
        self.users.lock().unwrap().insert(
            username.to_string(),
            (
                User {
                    id,
                    username: username.to_string(),
                    playername: playername.to_string(),
                },
                password.to_string(),
            ),
        );
    }
}

#[async_trait]
impl UserService for FakeUserService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, UserServiceError> {
        let users = self.users.lock().unwrap();
        Ok(match users.get(username) {
            None => LoginOutcome::NoSuchUser,
            Some((user, pw)) if pw == password => LoginOutcome::Success(user.id),
            Some(_) => LoginOutcome::BadPassword,
        })
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserServiceError> {
        if self.fail_get_by_id.load(Ordering::Relaxed) {
            return Err(UserServiceError::Timeout);
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|(user, _)| user.id == id)
            .map(|(user, _)| user.clone()))
    }

    async fn get_inventory(&self, _id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        Ok(serde_json::json!({}))
    }

    async fn get_cosmetics(&self, _id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        Ok(serde_json::json!({}))
    }

    async fn get_loadouts(&self, _id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        Ok(serde_json::json!({}))
    }

    async fn get_buy_menu(&self, _id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        Ok(serde_json::json!({}))
    }

    async fn set_buy_menu(&self, _id: UserId, _payload: OpaqueBundle) -> Result<(), UserServiceError> {
        Ok(())
    }

    async fn set_loadout_weapon(
        &self,
        _id: UserId,
        _payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        Ok(())
    }

    async fn set_cosmetic_slot(
        &self,
        _id: UserId,
        _payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        Ok(())
    }

    async fn session_count(&self) -> Result<u32, UserServiceError> {
        if self.fail_session_count.load(Ordering::Relaxed) {
            return Err(UserServiceError::Timeout);
        }
        Ok(0)
    }
}

fn build_ctx(fake: Arc<FakeUserService>) -> Arc<HandlerCtx> {
    let directory = Arc::new(ChannelDirectory::new(vec![ChannelServer::new(
        "NA-1",
        ["General".to_string()],
    )]));
    let registry = Arc::new(SessionRegistry::new());
    let userservice: Arc<dyn UserService> = fake;
    let probe = Arc::new(Probe::new(Arc::clone(&userservice)));
    Arc::new(HandlerCtx::new(registry, directory, userservice, probe))
}

async fn connect(dispatcher: &Arc<Dispatcher>) -> (Arc<Conn>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connect_task = tokio::spawn(TcpStream::connect(addr));
    let (server_stream, peer_addr) = listener.accept().await.unwrap();
    let client_stream = connect_task.await.unwrap().unwrap();

    let handler: Arc<dyn FrameHandler> = Arc::clone(dispatcher) as Arc<dyn FrameHandler>;
    let conn = spawn_connection(server_stream, peer_addr, Duration::from_secs(30), None, handler);
    (conn, client_stream)
}

async fn send_packet(stream: &mut TcpStream, packet_id: u8, body: &[u8]) {
    let mut enc = FrameEncoder::new();
    enc.begin_packet(packet_id);
    enc.append_bytes(body);
    let bytes = enc.finish_packet(0).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn read_packet(stream: &mut TcpStream) -> Frame {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(frame) = decoder.try_next_frame().unwrap() {
            return frame;
        }
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "stream closed while waiting for a frame");
        decoder.queue_bytes(BytesMut::from(&buf[..n]));
    }
}

async fn login(stream: &mut TcpStream, username: &str, password: &str) {
    let mut body = Vec::new();
    PacketString::from(username).encode(&mut body);
    PacketString::from(password).encode(&mut body);
    send_packet(stream, ClientPacketId::Login as u8, &body).await;

    for expected in [
        ServerPacketId::UserStart,
        ServerPacketId::AchievementBlob,
        ServerPacketId::FullUserUpdate,
        ServerPacketId::InventoryBundle,
        ServerPacketId::ChannelList,
    ] {
        let frame = read_packet(stream).await;
        assert_eq!(frame.packet_id, expected as u8);
    }
}

fn new_room_packet(
    server_index: u8,
    channel_index: u8,
    mode: u32,
    map: u32,
    kill_limit: u32,
    win_limit: u32,
    bots_enabled: bool,
    name: &str,
    password: &str,
) -> Vec<u8> {
    let mut buf = vec![SUBOP_NEW_ROOM];
    server_index.encode(&mut buf);
    channel_index.encode(&mut buf);
    mode.encode(&mut buf);
    map.encode(&mut buf);
    kill_limit.encode(&mut buf);
    win_limit.encode(&mut buf);
    bots_enabled.encode(&mut buf);
    PacketString::from(name).encode(&mut buf);
    PacketString::from(password).encode(&mut buf);
    buf
}

fn join_room_packet(server_index: u8, channel_index: u8, room_id: u32, password: &str) -> Vec<u8> {
    let mut buf = vec![SUBOP_JOIN_ROOM];
    server_index.encode(&mut buf);
    channel_index.encode(&mut buf);
    room_id.encode(&mut buf);
    PacketString::from(password).encode(&mut buf);
    buf
}

#[allow(dead_code)]
fn set_user_team_packet(target_user_id: u64, team: u8) -> Vec<u8> {
    let mut buf = vec![SUBOP_SET_USER_TEAM];
    target_user_id.encode(&mut buf);
    team.encode(&mut buf);
    buf
}

fn countdown_packet(should_count: bool, count: u8) -> Vec<u8> {
    let mut buf = vec![SUBOP_GAME_START_COUNTDOWN];
    should_count.encode(&mut buf);
    count.encode(&mut buf);
    buf
}

fn game_start_packet() -> Vec<u8> {
    vec![SUBOP_GAME_START]
}

#[tokio::test]
async fn login_sends_full_post_login_sequence() {
    let fake = Arc::new(FakeUserService::new());
    fake.add_user("alice", "secret", 1, "Alice");
    let ctx = build_ctx(fake);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
    let (_conn, mut client) = connect(&dispatcher).await;

    let mut body = Vec::new();
    PacketString::from("alice").encode(&mut body);
    PacketString::from("secret").encode(&mut body);
    send_packet(&mut client, ClientPacketId::Login as u8, &body).await;

    let user_start = read_packet(&mut client).await;
    assert_eq!(user_start.packet_id, ServerPacketId::UserStart as u8);
    let mut r = &user_start.body[..];
    let user_id = u64::decode(&mut r).unwrap();
    let username = PacketString::decode(&mut r).unwrap();
    let playername = PacketString::decode(&mut r).unwrap();
    let holepunch_port = u16::decode(&mut r).unwrap();
    assert_eq!(user_id, 1);
    assert_eq!(&*username, "alice");
    assert_eq!(&*playername, "Alice");
    assert_eq!(holepunch_port, master_net::DEFAULT_UDP_PORT);

    for expected in [
        ServerPacketId::AchievementBlob,
        ServerPacketId::FullUserUpdate,
        ServerPacketId::InventoryBundle,
        ServerPacketId::ChannelList,
    ] {
        let frame = read_packet(&mut client).await;
        assert_eq!(frame.packet_id, expected as u8);
    }

    assert!(ctx.registry.find_by_owner_id(1).is_some());
}

#[tokio::test]
async fn create_room_then_wrong_password_join_is_rejected() {
    let fake = Arc::new(FakeUserService::new());
    fake.add_user("alice", "pw1", 1, "Alice");
    fake.add_user("bob", "pw2", 2, "Bob");
    let ctx = build_ctx(fake);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));

    let (_host_conn, mut host) = connect(&dispatcher).await;
    login(&mut host, "alice", "pw1").await;

    send_packet(
        &mut host,
        ClientPacketId::Room as u8,
        &new_room_packet(0, 0, 0, 0, 10, 5, true, "r1", "secret"),
    )
    .await;
    let join_new_room = read_packet(&mut host).await;
    assert_eq!(join_new_room.packet_id, ServerPacketId::JoinNewRoom as u8);
    let mut r = &join_new_room.body[..];
    let room_id = u32::decode(&mut r).unwrap();
    assert_eq!(room_id, 1);
    let room_settings = read_packet(&mut host).await;
    assert_eq!(room_settings.packet_id, ServerPacketId::RoomSettings as u8);

    let (_guest_conn, mut guest) = connect(&dispatcher).await;
    login(&mut guest, "bob", "pw2").await;

    send_packet(
        &mut guest,
        ClientPacketId::Room as u8,
        &join_room_packet(0, 0, 1, "WRONG"),
    )
    .await;
    let dialog = read_packet(&mut guest).await;
    assert_eq!(dialog.packet_id, ServerPacketId::SystemDialog as u8);

    let room = ctx.directory.get_channel(0, 0).unwrap().get_room(1).unwrap();
    assert!(!room.is_occupant(2), "the wrong password must not have let bob in");
    assert_eq!(room.occupant_count(), 1);
}

#[tokio::test]
async fn countdown_then_game_start_transitions_waiting_to_ingame() {
    let fake = Arc::new(FakeUserService::new());
    fake.add_user("alice", "pw", 1, "Alice");
    let ctx = build_ctx(fake);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));

    let (_conn, mut host) = connect(&dispatcher).await;
    login(&mut host, "alice", "pw").await;

    send_packet(
        &mut host,
        ClientPacketId::Room as u8,
        &new_room_packet(0, 0, 0, 0, 10, 5, true, "r1", ""),
    )
    .await;
    let _join_new_room = read_packet(&mut host).await;
    let _room_settings = read_packet(&mut host).await;

    send_packet(&mut host, ClientPacketId::Room as u8, &countdown_packet(true, 5)).await;
    let tick = read_packet(&mut host).await;
    assert_eq!(tick.packet_id, ServerPacketId::CountdownTick as u8);
    assert_eq!(tick.body[0], 5);

    send_packet(&mut host, ClientPacketId::Room as u8, &countdown_packet(true, 0)).await;
    let tick_zero = read_packet(&mut host).await;
    assert_eq!(tick_zero.packet_id, ServerPacketId::CountdownTick as u8);
    assert_eq!(tick_zero.body[0], 0);

    send_packet(&mut host, ClientPacketId::Room as u8, &game_start_packet()).await;
    let started = read_packet(&mut host).await;
    assert_eq!(started.packet_id, ServerPacketId::GameStarted as u8);

    let room = ctx.directory.get_channel(0, 0).unwrap().get_room(1).unwrap();
    assert_eq!(room.status(), RoomStatus::Ingame);
}

#[tokio::test]
async fn host_disconnect_migrates_to_earliest_remaining_occupant() {
    let fake = Arc::new(FakeUserService::new());
    fake.add_user("alice", "pw", 1, "Alice");
    fake.add_user("bob", "pw", 2, "Bob");
    fake.add_user("carol", "pw", 3, "Carol");
    let ctx = build_ctx(fake);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));

    let (conn_a, mut a) = connect(&dispatcher).await;
    login(&mut a, "alice", "pw").await;
    send_packet(
        &mut a,
        ClientPacketId::Room as u8,
        &new_room_packet(0, 0, 0, 0, 10, 5, true, "r1", ""),
    )
    .await;
    let _ = read_packet(&mut a).await; // JoinNewRoom
    let _ = read_packet(&mut a).await; // RoomSettings

    let (_conn_b, mut b) = connect(&dispatcher).await;
    login(&mut b, "bob", "pw").await;
    send_packet(&mut b, ClientPacketId::Room as u8, &join_room_packet(0, 0, 1, "")).await;
    let _ = read_packet(&mut b).await; // JoinNewRoom
    let _ = read_packet(&mut b).await; // RoomSettings
    let _ = read_packet(&mut b).await; // RoomRoster
    let new_player_bob_on_a = read_packet(&mut a).await; // NewPlayer(bob), not sent back to bob himself
    assert_eq!(new_player_bob_on_a.packet_id, ServerPacketId::NewPlayer as u8);

    let (_conn_c, mut c) = connect(&dispatcher).await;
    login(&mut c, "carol", "pw").await;
    send_packet(&mut c, ClientPacketId::Room as u8, &join_room_packet(0, 0, 1, "")).await;
    let _ = read_packet(&mut c).await; // JoinNewRoom
    let _ = read_packet(&mut c).await; // RoomSettings
    let _ = read_packet(&mut c).await; // RoomRoster
    let new_player_carol_on_a = read_packet(&mut a).await; // NewPlayer(carol), not sent back to carol herself
    assert_eq!(new_player_carol_on_a.packet_id, ServerPacketId::NewPlayer as u8);
    let new_player_carol_on_b = read_packet(&mut b).await;
    assert_eq!(new_player_carol_on_b.packet_id, ServerPacketId::NewPlayer as u8);

    dispatcher.on_disconnect(&conn_a).await;

    let room = ctx.directory.get_channel(0, 0).unwrap().get_room(1).unwrap();
    assert_eq!(room.host(), 2, "host should migrate to bob, the earliest-joined remaining occupant");
    assert!(!room.is_occupant(1));
    assert!(ctx.registry.find_by_owner_id(1).is_none());

    let player_left = read_packet(&mut b).await;
    assert_eq!(player_left.packet_id, ServerPacketId::PlayerLeft as u8);
    let host_changed = read_packet(&mut b).await;
    assert_eq!(host_changed.packet_id, ServerPacketId::HostChanged as u8);
    let mut r = &host_changed.body[..];
    assert_eq!(u64::decode(&mut r).unwrap(), 2);
}

#[tokio::test]
async fn login_surfaces_upstream_dialog_and_leaves_probe_down() {
    let fake = Arc::new(FakeUserService::new());
    fake.add_user("alice", "pw", 1, "Alice");
    fake.fail_get_by_id.store(true, Ordering::Relaxed);
    fake.fail_session_count.store(true, Ordering::Relaxed);
    let ctx = build_ctx(fake);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));

    assert!(!ctx.probe.is_alive());

    let (_conn, mut client) = connect(&dispatcher).await;
    let mut body = Vec::new();
    PacketString::from("alice").encode(&mut body);
    PacketString::from("pw").encode(&mut body);
    send_packet(&mut client, ClientPacketId::Login as u8, &body).await;

    let dialog = read_packet(&mut client).await;
    assert_eq!(dialog.packet_id, ServerPacketId::SystemDialog as u8);

    assert!(!ctx.probe.is_alive(), "a connection-refused GetById should leave the probe down");
    assert!(!ctx.probe.check_now().await);
}
