//! Typed request/response bodies for each handler. Concrete wire layouts of
//! individual game packets are explicitly out of scope for this core
//! (spec.md §1); everything in this module past the shared header/framing is
//! this implementation's own choice, built on `master-protocol`'s primitive
//! codec the same way the teacher builds concrete packets on
//! `valence_protocol::{Encode, Decode}`.

use bytes::Bytes;
use master_model::{ReadyState, RoomStatus, Team};
use master_protocol::{CodecError, Decode, Encode, PacketLongString, PacketString};

fn reader(body: &Bytes) -> &[u8] {
    &body[..]
}

pub fn decode_body<'a, T: Decode<'a>>(body: &'a Bytes) -> Result<T, CodecError> {
    let mut r = reader(body);
    T::decode(&mut r)
}

fn encode_one<T: Encode>(value: &T) -> Bytes {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    Bytes::from(buf)
}

pub fn team_to_u8(team: Team) -> u8 {
    match team {
        Team::Terror => 0,
        Team::Counter => 1,
    }
}

pub fn team_from_u8(value: u8) -> Option<Team> {
    match value {
        0 => Some(Team::Terror),
        1 => Some(Team::Counter),
        _ => None,
    }
}

pub fn ready_to_u8(ready: ReadyState) -> u8 {
    match ready {
        ReadyState::NotReady => 0,
        ReadyState::Ready => 1,
        ReadyState::IngameReady => 2,
    }
}

pub fn status_to_u8(status: RoomStatus) -> u8 {
    match status {
        RoomStatus::Waiting => 0,
        RoomStatus::Countdown => 1,
        RoomStatus::Ingame => 2,
        RoomStatus::Result => 3,
        RoomStatus::Closed => 4,
    }
}

// ---- Room sub-operation discriminator ----

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomSubOp {
    NewRoom = 0,
    JoinRoom = 1,
    LeaveRoom = 2,
    ToggleReady = 3,
    UpdateSettings = 4,
    SetUserTeam = 5,
    GameStartCountdown = 6,
    GameStart = 7,
    CloseResultWindow = 8,
    EnterChannel = 9,
}

impl RoomSubOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::NewRoom,
            1 => Self::JoinRoom,
            2 => Self::LeaveRoom,
            3 => Self::ToggleReady,
            4 => Self::UpdateSettings,
            5 => Self::SetUserTeam,
            6 => Self::GameStartCountdown,
            7 => Self::GameStart,
            8 => Self::CloseResultWindow,
            9 => Self::EnterChannel,
            _ => return None,
        })
    }
}

/// Selects a channel to browse: joins its lobby set and asks for a
/// `SendRoomListTo` snapshot (spec.md §4.6 directory operations).
pub struct EnterChannelRequest {
    pub server_index: u8,
    pub channel_index: u8,
}

impl<'a> Decode<'a> for EnterChannelRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            server_index: u8::decode(r)?,
            channel_index: u8::decode(r)?,
        })
    }
}

pub struct NewRoomRequest {
    pub server_index: u8,
    pub channel_index: u8,
    pub mode: u32,
    pub map: u32,
    pub kill_limit: u32,
    pub win_limit: u32,
    pub bots_enabled: bool,
    pub name: PacketString,
    pub password: PacketString,
}

impl<'a> Decode<'a> for NewRoomRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            server_index: u8::decode(r)?,
            channel_index: u8::decode(r)?,
            mode: u32::decode(r)?,
            map: u32::decode(r)?,
            kill_limit: u32::decode(r)?,
            win_limit: u32::decode(r)?,
            bots_enabled: bool::decode(r)?,
            name: PacketString::decode(r)?,
            password: PacketString::decode(r)?,
        })
    }
}

pub struct JoinRoomRequest {
    pub server_index: u8,
    pub channel_index: u8,
    pub room_id: u32,
    pub password: PacketString,
}

impl<'a> Decode<'a> for JoinRoomRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            server_index: u8::decode(r)?,
            channel_index: u8::decode(r)?,
            room_id: u32::decode(r)?,
            password: PacketString::decode(r)?,
        })
    }
}

pub struct UpdateSettingsRequest {
    pub mode: u32,
    pub map: u32,
    pub kill_limit: u32,
    pub win_limit: u32,
    pub bots_enabled: bool,
    pub name: PacketString,
    pub password: PacketString,
}

impl<'a> Decode<'a> for UpdateSettingsRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            mode: u32::decode(r)?,
            map: u32::decode(r)?,
            kill_limit: u32::decode(r)?,
            win_limit: u32::decode(r)?,
            bots_enabled: bool::decode(r)?,
            name: PacketString::decode(r)?,
            password: PacketString::decode(r)?,
        })
    }
}

pub struct SetUserTeamRequest {
    pub target_user_id: u64,
    pub team: u8,
}

impl<'a> Decode<'a> for SetUserTeamRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            target_user_id: u64::decode(r)?,
            team: u8::decode(r)?,
        })
    }
}

pub struct GameStartCountdownRequest {
    pub should_count: bool,
    pub count: u8,
}

impl<'a> Decode<'a> for GameStartCountdownRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            should_count: bool::decode(r)?,
            count: u8::decode(r)?,
        })
    }
}

// ---- Host sub-operation discriminator ----

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSubOp {
    OnGameEnd = 0,
    SetInventory = 1,
    SetLoadout = 2,
    SetBuyMenu = 3,
    TeamChanging = 4,
    ItemUsing = 5,
}

impl HostSubOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::OnGameEnd,
            1 => Self::SetInventory,
            2 => Self::SetLoadout,
            3 => Self::SetBuyMenu,
            4 => Self::TeamChanging,
            5 => Self::ItemUsing,
            _ => return None,
        })
    }
}

/// `target_user_id` followed by an opaque forwarded payload; the host
/// handler never interprets the payload, only relays it (spec.md §4.7
/// "Host-authority handlers ... forward a host-scoped packet").
pub struct HostForwardRequest {
    pub target_user_id: u64,
    pub payload: Bytes,
}

impl HostForwardRequest {
    pub fn decode(body: &Bytes) -> Result<Self, CodecError> {
        let mut r = reader(body);
        let target_user_id = u64::decode(&mut r)?;
        let payload = Bytes::copy_from_slice(r);
        Ok(Self {
            target_user_id,
            payload,
        })
    }
}

// ---- Favorite sub-operation discriminator ----

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteSubOp {
    SetLoadout = 0,
    SetCosmetics = 1,
}

impl FavoriteSubOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::SetLoadout,
            1 => Self::SetCosmetics,
            _ => return None,
        })
    }
}

/// Shared shape for every "replace my own opaque JSON blob" request: Option's
/// `SetBuyMenu` and both Favorite sub-ops carry nothing but a JSON document
/// describing the new value, which is handed to `master-userservice`
/// untouched (spec.md §1 treats inventory/cosmetics/loadout shapes as
/// opaque).
pub fn decode_json_payload(body: &Bytes) -> Result<serde_json::Value, CodecError> {
    let mut r = reader(body);
    let text = PacketLongString::decode(&mut r)?;
    serde_json::from_str(&text).map_err(|_| CodecError::BadLength {
        declared: text.len(),
        available: 0,
    })
}

// ---- Login ----

pub struct LoginRequest {
    pub username: PacketString,
    pub password: PacketString,
}

impl<'a> Decode<'a> for LoginRequest {
    fn decode(r: &mut &'a [u8]) -> Result<Self, CodecError> {
        Ok(Self {
            username: PacketString::decode(r)?,
            password: PacketString::decode(r)?,
        })
    }
}

// ---- Outbound packet encoders ----

pub fn encode_user_start(user_id: u64, username: &str, playername: &str, holepunch_port: u16) -> Bytes {
    let mut buf = Vec::new();
    user_id.encode(&mut buf);
    PacketString::from(username).encode(&mut buf);
    PacketString::from(playername).encode(&mut buf);
    holepunch_port.encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_full_user_update(user_id: u64, username: &str, playername: &str) -> Bytes {
    let mut buf = Vec::new();
    user_id.encode(&mut buf);
    PacketString::from(username).encode(&mut buf);
    PacketString::from(playername).encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_inventory_bundle(
    inventory: &serde_json::Value,
    cosmetics: &serde_json::Value,
    loadouts: &serde_json::Value,
    buy_menu: &serde_json::Value,
) -> Bytes {
    let mut buf = Vec::new();
    for value in [inventory, cosmetics, loadouts, buy_menu] {
        PacketLongString::from(value.to_string().as_str()).encode(&mut buf);
    }
    Bytes::from(buf)
}

pub fn encode_channel_list(entries: &[master_model::ChannelListEntry]) -> Bytes {
    let mut buf = Vec::new();
    (entries.len() as u16).encode(&mut buf);
    for entry in entries {
        (entry.server_index as u8).encode(&mut buf);
        (entry.channel_index as u8).encode(&mut buf);
        PacketString::from(entry.name.as_str()).encode(&mut buf);
        (entry.room_count as u32).encode(&mut buf);
    }
    Bytes::from(buf)
}

pub fn encode_room_list(entries: &[master_model::RoomListEntry]) -> Bytes {
    let mut buf = Vec::new();
    (entries.len() as u16).encode(&mut buf);
    for entry in entries {
        entry.room_id.encode(&mut buf);
        PacketString::from(entry.name.as_str()).encode(&mut buf);
        (entry.player_count as u8).encode(&mut buf);
        (entry.capacity as u8).encode(&mut buf);
        entry.has_password.encode(&mut buf);
        status_to_u8(entry.status).encode(&mut buf);
    }
    Bytes::from(buf)
}

pub fn encode_join_new_room(room_id: u32) -> Bytes {
    encode_one(&room_id)
}

#[allow(clippy::too_many_arguments)]
pub fn encode_room_settings(
    room_id: u32,
    host: u64,
    status: RoomStatus,
    countdown_value: u8,
    settings: &master_model::RoomSettings,
) -> Bytes {
    let mut buf = Vec::new();
    room_id.encode(&mut buf);
    host.encode(&mut buf);
    status_to_u8(status).encode(&mut buf);
    countdown_value.encode(&mut buf);
    settings.mode.encode(&mut buf);
    settings.map.encode(&mut buf);
    settings.kill_limit.encode(&mut buf);
    settings.win_limit.encode(&mut buf);
    settings.bots_enabled.encode(&mut buf);
    PacketString::from(settings.name.as_str()).encode(&mut buf);
    PacketString::from(settings.password.as_str()).encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_room_roster(occupants: &[(u64, uuid::Uuid, ReadyState, Team)]) -> Bytes {
    let mut buf = Vec::new();
    (occupants.len() as u16).encode(&mut buf);
    for (user_id, _conn_id, ready, team) in occupants {
        user_id.encode(&mut buf);
        ready_to_u8(*ready).encode(&mut buf);
        team_to_u8(*team).encode(&mut buf);
    }
    Bytes::from(buf)
}

pub fn encode_new_player(user_id: u64, playername: &str) -> Bytes {
    let mut buf = Vec::new();
    user_id.encode(&mut buf);
    PacketString::from(playername).encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_player_left(user_id: u64) -> Bytes {
    encode_one(&user_id)
}

pub fn encode_host_changed(new_host: u64) -> Bytes {
    encode_one(&new_host)
}

pub fn encode_ready_changed(user_id: u64, ready: ReadyState) -> Bytes {
    let mut buf = Vec::new();
    user_id.encode(&mut buf);
    ready_to_u8(ready).encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_team_changed(user_id: u64, team: Team) -> Bytes {
    let mut buf = Vec::new();
    user_id.encode(&mut buf);
    team_to_u8(team).encode(&mut buf);
    Bytes::from(buf)
}

pub fn encode_countdown_tick(value: u8) -> Bytes {
    encode_one(&value)
}

pub fn encode_empty() -> Bytes {
    Bytes::new()
}

pub fn encode_system_dialog(message: &str) -> Bytes {
    let mut buf = Vec::new();
    PacketLongString::from(message).encode(&mut buf);
    Bytes::from(buf)
}
