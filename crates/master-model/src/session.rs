//! Post-login session state attached to a connection (spec.md §3
//! `UserSession`). Deliberately holds no reference back to the connection
//! or socket — `master-net::Conn` points to a `UserSession`, never the
//! reverse, which is how spec.md §9's back-reference cycle is broken.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Instant;

use master_userservice::User;

use crate::room::RoomId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCoords {
    pub server_index: usize,
    pub channel_index: usize,
}

pub struct UserSession {
    pub user: User,
    pub remote_addr: SocketAddr,
    pub login_at: Instant,
    current_channel: Mutex<Option<ChannelCoords>>,
    current_room: Mutex<Option<RoomId>>,
}

impl UserSession {
    pub fn new(user: User, remote_addr: SocketAddr) -> Self {
        Self {
            user,
            remote_addr,
            login_at: Instant::now(),
            current_channel: Mutex::new(None),
            current_room: Mutex::new(None),
        }
    }

    pub fn current_channel(&self) -> Option<ChannelCoords> {
        *self.current_channel.lock().unwrap()
    }

    pub fn set_channel(&self, coords: ChannelCoords) {
        *self.current_channel.lock().unwrap() = Some(coords);
    }

    pub fn clear_channel(&self) {
        *self.current_channel.lock().unwrap() = None;
    }

    pub fn current_room(&self) -> Option<RoomId> {
        *self.current_room.lock().unwrap()
    }

    pub fn set_room(&self, room_id: RoomId) {
        *self.current_room.lock().unwrap() = Some(room_id);
    }

    pub fn clear_room(&self) {
        *self.current_room.lock().unwrap() = None;
    }
}
