//! System-dialog strings sent to clients on invariant violations and
//! not-found lookups (spec.md §7). Named constants rather than inline
//! literals, the same way the teacher names its disconnect reasons as
//! `translation_key::MULTIPLAYER_DISCONNECT_*` constants instead of
//! scattering the English text through the handshake code.

pub const GAME_BAD_USERNAME: &str = "bad username";
pub const GAME_BAD_PASSWORD: &str = "bad password";
pub const GAME_INVALID_USER_INFO: &str = "invalid user info";
pub const GAME_UPSTREAM_UNAVAILABLE: &str = "user service unavailable, try again shortly";

pub const GAME_NO_SUCH_SERVER: &str = "no such channel server";
pub const GAME_NO_SUCH_CHANNEL: &str = "no such channel";
pub const GAME_NO_SUCH_ROOM: &str = "no such room";
pub const GAME_ROOM_FULL: &str = "room is full";
pub const GAME_ROOM_CLOSED: &str = "room no longer exists";
pub const GAME_BAD_ROOM_PASSWORD: &str = "incorrect room password";
pub const GAME_NOT_OCCUPANT: &str = "you are not in this room";
pub const GAME_NOT_HOST: &str = "only the host can do that";
pub const GAME_WRONG_STATUS: &str = "room is not in a state that allows this";
pub const GAME_CANNOT_START: &str = "both teams need at least one player";
pub const GAME_BAD_SETTINGS: &str = "rejected room settings";
pub const GAME_TARGET_NOT_FOUND: &str = "that player is not connected";
