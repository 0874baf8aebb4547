//! Upstream user-service coupling: a thin HTTP/JSON client, two small TTL
//! caches, and a periodic liveness probe (spec.md §1 item 4, §4.4, §4.5).

pub mod cache;
pub mod client;
pub mod error;
pub mod model;
pub mod probe;
pub mod service;

pub use cache::TtlCache;
pub use client::UserServiceClient;
pub use error::UserServiceError;
pub use model::{LoginOutcome, OpaqueBundle, User, UserId, ACHIEVEMENTS_STUB};
pub use probe::Probe;
pub use service::UserService;
