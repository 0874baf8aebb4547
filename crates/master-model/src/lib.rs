//! Channel/room model: the channel-server directory and the room state
//! machine (spec.md §1 item 3, §3, §4.6). Free of networking concerns —
//! rooms and channels deal in user ids and connection ids, never sockets.

pub mod channel;
pub mod error;
pub mod room;
pub mod session;

pub use channel::{Channel, ChannelDirectory, ChannelListEntry, ChannelServer, RoomListEntry};
pub use error::ModelError;
pub use room::{ReadyState, Room, RoomEvent, RoomId, RoomSettings, RoomStatus, Team, ROOM_CAPACITY};
pub use session::{ChannelCoords, UserSession};
