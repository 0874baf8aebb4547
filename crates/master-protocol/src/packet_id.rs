//! The packet id enumeration. spec.md calls the wire ids "opaque to this
//! spec except for dispatch"; the numeric values below are this
//! implementation's choice, split so client->server and server->client ids
//! are visually distinguishable in logs (DESIGN.md).

/// Client -> server packet ids, dispatched on by `master-handlers::Dispatcher`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientPacketId {
    Login = 1,
    AboutMe = 2,
    Room = 3,
    Host = 4,
    Option = 5,
    Favorite = 6,
    Achievement = 7,
}

impl ClientPacketId {
    pub fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::Login,
            2 => Self::AboutMe,
            3 => Self::Room,
            4 => Self::Host,
            5 => Self::Option,
            6 => Self::Favorite,
            7 => Self::Achievement,
            _ => return None,
        })
    }
}

/// Server -> client packet ids.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerPacketId {
    UserStart = 0x80,
    AchievementBlob = 0x81,
    FullUserUpdate = 0x82,
    InventoryBundle = 0x83,
    ChannelList = 0x84,
    RoomList = 0x85,
    JoinNewRoom = 0x86,
    RoomSettings = 0x87,
    RoomRoster = 0x88,
    NewPlayer = 0x89,
    PlayerLeft = 0x8A,
    HostChanged = 0x8B,
    ReadyChanged = 0x8C,
    TeamChanged = 0x8D,
    CountdownTick = 0x8E,
    CountdownCancelled = 0x8F,
    GameStarted = 0x90,
    GameEnded = 0x91,
    SystemDialog = 0x92,
    /// A host-authority packet relayed to a specific target connection
    /// verbatim (spec.md §4.7 "forward a host-scoped packet").
    HostForward = 0x93,
}
