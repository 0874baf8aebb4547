//! The subset of `UserServiceClient` that handlers and the probe depend on,
//! pulled out as a trait so `master-server`'s scenario tests can swap in a
//! fake upstream without a live HTTP stub (spec.md §8).

use async_trait::async_trait;

use crate::error::UserServiceError;
use crate::model::{LoginOutcome, OpaqueBundle, User, UserId};

#[async_trait]
pub trait UserService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, UserServiceError>;
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserServiceError>;
    async fn get_inventory(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError>;
    async fn get_cosmetics(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError>;
    async fn get_loadouts(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError>;
    async fn get_buy_menu(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError>;
    async fn set_buy_menu(&self, id: UserId, payload: OpaqueBundle) -> Result<(), UserServiceError>;
    async fn set_loadout_weapon(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError>;
    async fn set_cosmetic_slot(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError>;
    async fn session_count(&self) -> Result<u32, UserServiceError>;
}
