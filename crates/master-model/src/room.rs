//! The room state machine (spec.md §3, §4.6). A `Room` is an ephemeral
//! match-making session with a host, a fixed-capacity roster, settings, and
//! a `Waiting -> Countdown -> Ingame -> Result` lifecycle.
//!
//! Back-references follow spec.md §9's DESIGN NOTES: a room stores occupant
//! records holding user ids, not connection pointers, the same
//! id-indirection `examples/other_examples/…room_manager.rs`'s `RoomEntry`
//! uses to keep a room manager from holding live socket handles directly.
//! Resolving a user id to a live connection is the caller's job
//! (`master-registry`), kept out of this crate so the model stays free of
//! networking concerns.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::ModelError;

pub type RoomId = u32;
pub const ROOM_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Terror,
    Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    NotReady,
    Ready,
    IngameReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Countdown,
    Ingame,
    Result,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub enum Slot {
    Empty,
    Occupied {
        user_id: u64,
        conn_id: Uuid,
        ready: ReadyState,
        team: Team,
        /// Monotonic join order, used to pick "earliest-joined remaining
        /// occupant" on host migration without requiring ordered iteration.
        joined_at: u64,
    },
}

impl Slot {
    fn user_id(&self) -> Option<u64> {
        match self {
            Slot::Occupied { user_id, .. } => Some(*user_id),
            Slot::Empty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    pub name: String,
    /// Empty password means public (spec.md §4.6 "Password & settings").
    pub password: String,
    pub map: u32,
    pub mode: u32,
    pub kill_limit: u32,
    pub win_limit: u32,
    pub bots_enabled: bool,
}

/// Recognized enum ranges for settings validation (spec.md §4.6: "Settings
/// are validated per field against a recognized enum of options").
const MAP_RANGE: std::ops::RangeInclusive<u32> = 0..=31;
const MODE_RANGE: std::ops::RangeInclusive<u32> = 0..=7;
const KILL_LIMIT_RANGE: std::ops::RangeInclusive<u32> = 1..=200;
const WIN_LIMIT_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

impl RoomSettings {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !MAP_RANGE.contains(&self.map) {
            return Err(ModelError::BadSettings(format!(
                "map {} out of range {MAP_RANGE:?}",
                self.map
            )));
        }
        if !MODE_RANGE.contains(&self.mode) {
            return Err(ModelError::BadSettings(format!(
                "mode {} out of range {MODE_RANGE:?}",
                self.mode
            )));
        }
        if !KILL_LIMIT_RANGE.contains(&self.kill_limit) {
            return Err(ModelError::BadSettings(format!(
                "kill_limit {} out of range {KILL_LIMIT_RANGE:?}",
                self.kill_limit
            )));
        }
        if !WIN_LIMIT_RANGE.contains(&self.win_limit) {
            return Err(ModelError::BadSettings(format!(
                "win_limit {} out of range {WIN_LIMIT_RANGE:?}",
                self.win_limit
            )));
        }
        Ok(())
    }

    fn is_public(&self) -> bool {
        self.password.is_empty()
    }
}

/// A broadcastable outcome of a room mutation. The handler layer turns
/// these into wire packets and fans them out through the owning channel's
/// lobby set; this crate only ever returns data, never touches a socket.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Joined { user_id: u64, slot_index: usize },
    Left { user_id: u64 },
    HostChanged { new_host: u64 },
    Closed,
    ReadyChanged { user_id: u64, ready: ReadyState },
    SettingsChanged,
    TeamChanged { user_id: u64, team: Team },
    CountdownTick { value: u8 },
    CountdownCancelled,
    GameStarted,
    GameEnded,
}

pub struct Room {
    pub id: RoomId,
    host: Mutex<u64>,
    slots: Mutex<[Slot; ROOM_CAPACITY]>,
    status: Mutex<RoomStatus>,
    countdown_value: AtomicU8,
    settings: Mutex<RoomSettings>,
    next_join_seq: AtomicU64,
}

impl Room {
    /// Creates a room in `Waiting` with the requester as host and sole
    /// occupant (spec.md §4.6 `NewRoomRequest`).
    pub fn new(id: RoomId, host_user_id: u64, host_conn_id: Uuid, settings: RoomSettings) -> Self {
        let mut slots = [Slot::Empty; ROOM_CAPACITY];
        slots[0] = Slot::Occupied {
            user_id: host_user_id,
            conn_id: host_conn_id,
            ready: ReadyState::NotReady,
            team: Team::Terror,
            joined_at: 0,
        };

        Self {
            id,
            host: Mutex::new(host_user_id),
            slots: Mutex::new(slots),
            status: Mutex::new(RoomStatus::Waiting),
            countdown_value: AtomicU8::new(0),
            settings: Mutex::new(settings),
            next_join_seq: AtomicU64::new(1),
        }
    }

    pub fn host(&self) -> u64 {
        *self.host.lock().unwrap()
    }

    pub fn status(&self) -> RoomStatus {
        *self.status.lock().unwrap()
    }

    pub fn countdown_value(&self) -> u8 {
        self.countdown_value.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> RoomSettings {
        self.settings.lock().unwrap().clone()
    }

    pub fn occupant_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Slot::Occupied { .. }))
            .count()
    }

    pub fn is_occupant(&self, user_id: u64) -> bool {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.user_id() == Some(user_id))
    }

    /// Snapshot of all occupied slots, for roster packets.
    pub fn occupants(&self) -> Vec<(u64, Uuid, ReadyState, Team)> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Slot::Occupied {
                    user_id,
                    conn_id,
                    ready,
                    team,
                    ..
                } => Some((*user_id, *conn_id, *ready, *team)),
                Slot::Empty => None,
            })
            .collect()
    }

    pub fn join(
        &self,
        user_id: u64,
        conn_id: Uuid,
        password: &str,
    ) -> Result<Vec<RoomEvent>, ModelError> {
        if self.status() == RoomStatus::Closed {
            return Err(ModelError::RoomClosed);
        }

        {
            let settings = self.settings.lock().unwrap();
            if !settings.is_public() && settings.password != password {
                return Err(ModelError::BadPassword);
            }
        }

        let mut slots = self.slots.lock().unwrap();
        let free_index = slots
            .iter()
            .position(|s| matches!(s, Slot::Empty))
            .ok_or(ModelError::RoomFull)?;

        let joined_at = self.next_join_seq.fetch_add(1, Ordering::AcqRel);
        slots[free_index] = Slot::Occupied {
            user_id,
            conn_id,
            ready: ReadyState::NotReady,
            team: Team::Terror,
            joined_at,
        };

        Ok(vec![RoomEvent::Joined {
            user_id,
            slot_index: free_index,
        }])
    }

    /// Removes `user_id`; migrates host to the earliest-joined remaining
    /// occupant, or closes the room if none remain (spec.md §4.6
    /// "Host migration").
    pub fn leave(&self, user_id: u64) -> Result<Vec<RoomEvent>, ModelError> {
        let is_countdown = self.status() == RoomStatus::Countdown;

        let mut slots = self.slots.lock().unwrap();
        let index = slots
            .iter()
            .position(|s| s.user_id() == Some(user_id))
            .ok_or(ModelError::NotOccupant)?;

        if let Slot::Occupied { ready, .. } = slots[index] {
            if is_countdown && ready != ReadyState::NotReady {
                return Err(ModelError::WrongStatus);
            }
        }

        slots[index] = Slot::Empty;

        let was_host = self.host() == user_id;

        let remaining_earliest = slots
            .iter()
            .filter_map(|s| match s {
                Slot::Occupied {
                    user_id, joined_at, ..
                } => Some((*joined_at, *user_id)),
                Slot::Empty => None,
            })
            .min_by_key(|(joined_at, _)| *joined_at);

        drop(slots);

        let mut events = vec![RoomEvent::Left { user_id }];

        match (was_host, remaining_earliest) {
            (_, None) => {
                *self.status.lock().unwrap() = RoomStatus::Closed;
                events.push(RoomEvent::Closed);
            }
            (true, Some((_, new_host))) => {
                *self.host.lock().unwrap() = new_host;
                events.push(RoomEvent::HostChanged { new_host });
            }
            (false, Some(_)) => {}
        }

        Ok(events)
    }

    pub fn toggle_ready(&self, user_id: u64) -> Result<Vec<RoomEvent>, ModelError> {
        if self.status() != RoomStatus::Waiting {
            return Err(ModelError::WrongStatus);
        }

        let mut slots = self.slots.lock().unwrap();
        let index = slots
            .iter()
            .position(|s| s.user_id() == Some(user_id))
            .ok_or(ModelError::NotOccupant)?;

        let Slot::Occupied { ready, .. } = &mut slots[index] else {
            unreachable!("index came from a matching Occupied slot");
        };

        *ready = match *ready {
            ReadyState::NotReady => ReadyState::Ready,
            ReadyState::Ready | ReadyState::IngameReady => ReadyState::NotReady,
        };
        let new_ready = *ready;

        Ok(vec![RoomEvent::ReadyChanged {
            user_id,
            ready: new_ready,
        }])
    }

    pub fn update_settings(
        &self,
        requester: u64,
        new_settings: RoomSettings,
    ) -> Result<Vec<RoomEvent>, ModelError> {
        if requester != self.host() {
            return Err(ModelError::NotHost);
        }
        match self.status() {
            RoomStatus::Countdown | RoomStatus::Ingame => return Err(ModelError::WrongStatus),
            _ => {}
        }

        new_settings.validate()?;
        *self.settings.lock().unwrap() = new_settings;

        Ok(vec![RoomEvent::SettingsChanged])
    }

    /// "if bots enabled, only host may change" (spec.md §4.6).
    pub fn set_user_team(
        &self,
        requester: u64,
        target: u64,
        team: Team,
    ) -> Result<Vec<RoomEvent>, ModelError> {
        let bots_enabled = self.settings.lock().unwrap().bots_enabled;
        if bots_enabled && requester != self.host() {
            return Err(ModelError::NotHost);
        }

        let mut slots = self.slots.lock().unwrap();
        let index = slots
            .iter()
            .position(|s| s.user_id() == Some(target))
            .ok_or(ModelError::NotOccupant)?;

        let Slot::Occupied {
            ready, team: slot_team, ..
        } = &mut slots[index]
        else {
            unreachable!("index came from a matching Occupied slot");
        };

        if *ready != ReadyState::NotReady {
            return Err(ModelError::WrongStatus);
        }

        *slot_team = team;

        Ok(vec![RoomEvent::TeamChanged {
            user_id: target,
            team,
        }])
    }

    /// Both teams non-empty, or bots cover the gap.
    pub fn can_start_game(&self) -> bool {
        let settings = self.settings.lock().unwrap();
        if settings.bots_enabled {
            return true;
        }

        let slots = self.slots.lock().unwrap();
        let (mut terror, mut counter) = (0, 0);
        for slot in slots.iter() {
            if let Slot::Occupied { team, .. } = slot {
                match team {
                    Team::Terror => terror += 1,
                    Team::Counter => counter += 1,
                }
            }
        }
        terror > 0 && counter > 0
    }

    /// `should_count = true` starts or ticks the countdown; `false` aborts
    /// it back to `Waiting` (spec.md §4.6 `GameStartCountdownRequest`).
    pub fn set_countdown(
        &self,
        requester: u64,
        should_count: bool,
        value: u8,
    ) -> Result<Vec<RoomEvent>, ModelError> {
        if requester != self.host() {
            return Err(ModelError::NotHost);
        }

        let mut status = self.status.lock().unwrap();

        if should_count {
            match *status {
                RoomStatus::Waiting => {
                    if !self.can_start_game() {
                        return Err(ModelError::CannotStartGame);
                    }
                    *status = RoomStatus::Countdown;
                }
                RoomStatus::Countdown => {}
                _ => return Err(ModelError::WrongStatus),
            }
            self.countdown_value.store(value, Ordering::Release);
            Ok(vec![RoomEvent::CountdownTick { value }])
        } else {
            if *status != RoomStatus::Countdown {
                return Err(ModelError::WrongStatus);
            }
            *status = RoomStatus::Waiting;
            self.countdown_value.store(0, Ordering::Release);
            Ok(vec![RoomEvent::CountdownCancelled])
        }
    }

    /// Host transitions `Countdown -> Ingame`; a non-host calling this
    /// mid-match is a "join in progress" acknowledgement — the requester's
    /// slot moves to `IngameReady` (spec.md §4.6 `GameStartRequest`, §3's
    /// `IngameReady` ready state).
    pub fn start_game(&self, requester: u64) -> Result<Vec<RoomEvent>, ModelError> {
        let mut status = self.status.lock().unwrap();
        if requester == self.host() {
            if *status != RoomStatus::Countdown {
                return Err(ModelError::WrongStatus);
            }
            *status = RoomStatus::Ingame;
            Ok(vec![RoomEvent::GameStarted])
        } else {
            if *status != RoomStatus::Ingame {
                return Err(ModelError::WrongStatus);
            }
            drop(status);

            let mut slots = self.slots.lock().unwrap();
            let index = slots
                .iter()
                .position(|s| s.user_id() == Some(requester))
                .ok_or(ModelError::NotOccupant)?;
            let Slot::Occupied { ready, .. } = &mut slots[index] else {
                unreachable!("index came from a matching Occupied slot");
            };
            *ready = ReadyState::IngameReady;

            Ok(vec![RoomEvent::ReadyChanged {
                user_id: requester,
                ready: ReadyState::IngameReady,
            }])
        }
    }

    pub fn end_game(&self, requester: u64) -> Result<Vec<RoomEvent>, ModelError> {
        if requester != self.host() {
            return Err(ModelError::NotHost);
        }
        let mut status = self.status.lock().unwrap();
        if *status != RoomStatus::Ingame {
            return Err(ModelError::WrongStatus);
        }
        *status = RoomStatus::Result;
        Ok(vec![RoomEvent::GameEnded])
    }

    /// Local to the requester; no broadcast (spec.md §4.6
    /// `OnCloseResultWindow`). Once every occupant has dismissed the result
    /// window the room quietly returns to `Waiting` for the next round.
    pub fn close_result_window(&self, user_id: u64) -> Result<(), ModelError> {
        if self.status() != RoomStatus::Result {
            return Err(ModelError::WrongStatus);
        }

        let mut slots = self.slots.lock().unwrap();
        let index = slots
            .iter()
            .position(|s| s.user_id() == Some(user_id))
            .ok_or(ModelError::NotOccupant)?;

        let Slot::Occupied { ready, .. } = &mut slots[index] else {
            unreachable!("index came from a matching Occupied slot");
        };
        *ready = ReadyState::NotReady;

        let all_dismissed = slots
            .iter()
            .all(|s| !matches!(s, Slot::Occupied { ready, .. } if *ready != ReadyState::NotReady));
        drop(slots);

        if all_dismissed {
            *self.status.lock().unwrap() = RoomStatus::Waiting;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(password: &str) -> RoomSettings {
        RoomSettings {
            name: "r1".into(),
            password: password.into(),
            map: 5,
            mode: 1,
            kill_limit: 30,
            win_limit: 3,
            bots_enabled: false,
        }
    }

    #[test]
    fn host_is_always_occupant_or_room_is_closed() {
        let room = Room::new(1, 100, Uuid::new_v4(), settings(""));
        room.join(200, Uuid::new_v4(), "").unwrap();
        room.join(300, Uuid::new_v4(), "").unwrap();

        let events = room.leave(100).unwrap();
        assert!(events.contains(&RoomEvent::HostChanged { new_host: 200 }));
        assert_eq!(room.host(), 200);
        assert!(room.is_occupant(room.host()));

        room.leave(200).unwrap();
        let events = room.leave(300).unwrap();
        assert!(events.contains(&RoomEvent::Closed));
        assert_eq!(room.status(), RoomStatus::Closed);
    }

    #[test]
    fn join_then_leave_restores_free_slots() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings(""));
        let before = room.occupant_count();
        room.join(2, Uuid::new_v4(), "").unwrap();
        assert_eq!(room.occupant_count(), before + 1);
        room.leave(2).unwrap();
        assert_eq!(room.occupant_count(), before);
    }

    #[test]
    fn room_at_capacity_rejects_join() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings(""));
        for i in 2..=ROOM_CAPACITY as u64 {
            room.join(i, Uuid::new_v4(), "").unwrap();
        }
        assert_eq!(room.occupant_count(), ROOM_CAPACITY);
        assert_eq!(
            room.join(999, Uuid::new_v4(), ""),
            Err(ModelError::RoomFull)
        );
    }

    #[test]
    fn wrong_password_is_rejected_byte_exact() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings("secret"));
        assert_eq!(
            room.join(2, Uuid::new_v4(), "x"),
            Err(ModelError::BadPassword)
        );
        assert!(room.join(2, Uuid::new_v4(), "secret").is_ok());
    }

    #[test]
    fn settings_frozen_during_countdown() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings(""));
        room.join(2, Uuid::new_v4(), "").unwrap();
        room.set_user_team(1, 1, Team::Terror).unwrap();
        room.set_user_team(1, 2, Team::Counter).unwrap();
        room.set_countdown(1, true, 5).unwrap();
        assert_eq!(room.status(), RoomStatus::Countdown);

        let result = room.update_settings(1, settings(""));
        assert_eq!(result, Err(ModelError::WrongStatus));
    }

    #[test]
    fn countdown_then_start_transitions_waiting_to_ingame() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings(""));
        room.join(2, Uuid::new_v4(), "").unwrap();
        room.set_user_team(1, 1, Team::Terror).unwrap();
        room.set_user_team(1, 2, Team::Counter).unwrap();

        room.set_countdown(1, true, 5).unwrap();
        room.set_countdown(1, true, 0).unwrap();
        assert_eq!(room.status(), RoomStatus::Countdown);

        let events = room.start_game(1).unwrap();
        assert_eq!(events, vec![RoomEvent::GameStarted]);
        assert_eq!(room.status(), RoomStatus::Ingame);
    }

    #[test]
    fn cannot_start_with_empty_team_and_bots_disabled() {
        let room = Room::new(1, 1, Uuid::new_v4(), settings(""));
        assert_eq!(
            room.set_countdown(1, true, 5),
            Err(ModelError::CannotStartGame)
        );
    }

    #[test]
    fn at_most_one_room_membership_is_caller_enforced() {
        // The room itself only tracks its own occupants; "at most one room
        // per user" is enforced by the handler forcing a prior leave before
        // a new join (spec.md §9 "ghost room" resolution), not by this type.
        let room_a = Room::new(1, 1, Uuid::new_v4(), settings(""));
        let room_b = Room::new(2, 1, Uuid::new_v4(), settings(""));
        assert!(room_a.is_occupant(1));
        assert!(room_b.is_occupant(1));
    }
}
