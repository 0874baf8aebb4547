use serde::{Deserialize, Serialize};

/// A user record as the upstream service returns it. Names are unique;
/// everything past the id/username/playername is opaque to the master
/// server (spec.md §1 excludes "credentials, inventory, cosmetics,
/// loadouts, session counters" from this core's concerns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub playername: String,
}

pub type UserId = u64;

/// Outcome of a login attempt against the upstream service, replacing the
/// legacy `0`/`-1`/`userId` sentinel-int convention (spec.md §4.5) with an
/// enum — see DESIGN.md's "Login return convention" decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(UserId),
    NoSuchUser,
    BadPassword,
}

/// Inventory/cosmetics/loadout/buy-menu payloads. Their internal shape is
/// out of scope for this core (spec.md §1); callers pass through whatever
/// the upstream service returns or accepts.
pub type OpaqueBundle = serde_json::Value;

/// The opaque achievements/unlocks blob sent right after login (spec.md
/// §4.7 Login handler ordering). Its payload format is out of scope.
pub const ACHIEVEMENTS_STUB: &[u8] = &[];
