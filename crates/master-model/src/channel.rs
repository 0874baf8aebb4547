//! The channel-server directory (spec.md §3, §4.6). A fixed, configured
//! list of channel servers, each with an ordered list of channels; a
//! channel owns its rooms by id (ids reused after closure) and tracks the
//! set of connections "in lobby" for broadcast.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::error::ModelError;
use crate::room::{Room, RoomId, RoomSettings, RoomStatus};

/// One named lobby grouping; the unit of room visibility and broadcast.
pub struct Channel {
    pub name: String,
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    next_candidate_id: AtomicU32,
    /// Connection ids present "in lobby" (not inside any room).
    lobby: RwLock<HashSet<Uuid>>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rooms: RwLock::new(HashMap::new()),
            next_candidate_id: AtomicU32::new(1),
            lobby: RwLock::new(HashSet::new()),
        }
    }

    /// Finds the lowest unused room id, reusing ids freed by closed rooms
    /// (spec.md §3: "ids may be reused after room closure").
    fn alloc_room_id(&self, rooms: &HashMap<RoomId, Arc<Room>>) -> RoomId {
        let mut candidate = self.next_candidate_id.load(Ordering::Relaxed);
        while rooms.contains_key(&candidate) {
            candidate += 1;
        }
        self.next_candidate_id.store(candidate + 1, Ordering::Relaxed);
        candidate
    }

    pub fn create_room(
        &self,
        host_user_id: u64,
        host_conn_id: Uuid,
        settings: RoomSettings,
    ) -> Arc<Room> {
        let mut rooms = self.rooms.write().unwrap();
        let id = self.alloc_room_id(&rooms);
        let room = Arc::new(Room::new(id, host_user_id, host_conn_id, settings));
        rooms.insert(id, Arc::clone(&room));
        room
    }

    pub fn get_room(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.read().unwrap().get(&id).cloned()
    }

    pub fn remove_room(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.write().unwrap().remove(&id)
    }

    pub fn join_lobby(&self, conn_id: Uuid) {
        self.lobby.write().unwrap().insert(conn_id);
    }

    pub fn leave_lobby(&self, conn_id: Uuid) {
        self.lobby.write().unwrap().remove(&conn_id);
    }

    /// A snapshot of lobby members. Per spec.md §5's concurrency
    /// discipline, callers clone this list, drop the channel's lock, and
    /// only then dispatch sends — the lock is never held for the duration
    /// of a per-connection send.
    pub fn lobby_members(&self) -> Vec<Uuid> {
        self.lobby.read().unwrap().iter().copied().collect()
    }

    pub fn room_list(&self) -> Vec<RoomListEntry> {
        self.rooms
            .read()
            .unwrap()
            .values()
            .map(|room| RoomListEntry {
                room_id: room.id,
                name: room.settings().name,
                player_count: room.occupant_count(),
                capacity: crate::room::ROOM_CAPACITY,
                has_password: !room.settings().password.is_empty(),
                status: room.status(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub name: String,
    pub player_count: usize,
    pub capacity: usize,
    pub has_password: bool,
    pub status: RoomStatus,
}

pub struct ChannelServer {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl ChannelServer {
    pub fn new(name: impl Into<String>, channel_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            channels: channel_names.into_iter().map(Channel::new).collect(),
        }
    }
}

/// The directory is built once at startup from configuration and is
/// read-mostly thereafter (spec.md §5 "Shared resources").
pub struct ChannelDirectory {
    servers: Vec<ChannelServer>,
}

#[derive(Debug, Clone)]
pub struct ChannelListEntry {
    pub server_index: usize,
    pub channel_index: usize,
    pub name: String,
    pub room_count: usize,
}

impl ChannelDirectory {
    pub fn new(servers: Vec<ChannelServer>) -> Self {
        Self { servers }
    }

    pub fn get_server(&self, server_index: usize) -> Result<&ChannelServer, ModelError> {
        self.servers.get(server_index).ok_or(ModelError::NoSuchServer)
    }

    pub fn get_channel(
        &self,
        server_index: usize,
        channel_index: usize,
    ) -> Result<&Channel, ModelError> {
        self.get_server(server_index)?
            .channels
            .get(channel_index)
            .ok_or(ModelError::NoSuchChannel)
    }

    pub fn channel_list(&self) -> Vec<ChannelListEntry> {
        self.servers
            .iter()
            .enumerate()
            .flat_map(|(server_index, server)| {
                server
                    .channels
                    .iter()
                    .enumerate()
                    .map(move |(channel_index, channel)| ChannelListEntry {
                        server_index,
                        channel_index,
                        name: channel.name.clone(),
                        room_count: channel.rooms.read().unwrap().len(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomSettings;

    fn settings() -> RoomSettings {
        RoomSettings {
            name: "r1".into(),
            password: String::new(),
            map: 0,
            mode: 0,
            kill_limit: 10,
            win_limit: 5,
            bots_enabled: true,
        }
    }

    #[test]
    fn room_ids_are_reused_after_closure() {
        let channel = Channel::new("general");
        let room1 = channel.create_room(1, Uuid::new_v4(), settings());
        assert_eq!(room1.id, 1);

        channel.remove_room(room1.id);

        let room2 = channel.create_room(2, Uuid::new_v4(), settings());
        assert_eq!(room2.id, 1, "freed id 1 should be reused");
    }

    #[test]
    fn bounds_checked_lookup() {
        let directory = ChannelDirectory::new(vec![ChannelServer::new(
            "na-1",
            vec!["general".to_string()],
        )]);

        assert!(directory.get_channel(0, 0).is_ok());
        assert_eq!(
            directory.get_channel(0, 5).unwrap_err(),
            ModelError::NoSuchChannel
        );
        assert_eq!(
            directory.get_channel(5, 0).unwrap_err(),
            ModelError::NoSuchServer
        );
    }
}
