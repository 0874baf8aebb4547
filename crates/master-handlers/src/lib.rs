//! Packet dispatch and the handler set: `Login`, `AboutMe`, `Room`, `Host`,
//! `Option`, `Favorite`, `Achievement` (spec.md §4.7). `Dispatcher` is the
//! `master-net::FrameHandler` a `master-net::Server` is built with.

mod about_me;
mod achievement;
mod ctx;
mod dialogs;
mod dispatcher;
mod error;
mod favorite;
mod host;
mod login;
mod option;
mod respond;
mod room;
mod room_lookup;
mod wire;

pub use ctx::HandlerCtx;
pub use dispatcher::{Dispatcher, PacketHandler};
pub use error::HandlerError;
