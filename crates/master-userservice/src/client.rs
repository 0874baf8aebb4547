use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::cache::TtlCache;
use crate::error::UserServiceError;
use crate::model::{LoginOutcome, OpaqueBundle, User, UserId};
use crate::service::UserService;

const USER_CACHE_CAPACITY: usize = 100;
const SESSION_COUNT_CAPACITY: usize = 1;
const CACHE_TTL: Duration = Duration::from_secs(15);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct UserIdBody {
    #[serde(rename = "userId")]
    user_id: UserId,
}

#[derive(Deserialize)]
struct PingBody {
    sessions: u32,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Thin HTTP/JSON client to the external user service (spec.md §4.5, §6).
/// A bounded timeout and two small TTL caches sit in front of the network.
pub struct UserServiceClient {
    http: Client,
    base_url: Url,
    user_by_id: TtlCache<UserId, User>,
    session_count: TtlCache<(), u32>,
}

impl UserServiceClient {
    pub fn new(host: &str, port: u16) -> Result<Self, UserServiceError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(map_reqwest_err)?;
        let base_url = Url::parse(&format!("http://{host}:{port}/"))
            .expect("userservice_host/port should form a valid URL");

        Ok(Self {
            http,
            base_url,
            user_by_id: TtlCache::new(USER_CACHE_CAPACITY, CACHE_TTL),
            session_count: TtlCache::new(SESSION_COUNT_CAPACITY, CACHE_TTL),
        })
    }

    fn url(&self, path: &str) -> Url {
        self.base_url
            .join(path)
            .expect("path segment should join cleanly onto the base URL")
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, UserServiceError> {
        let resp = self
            .http
            .post(self.url("users/auth/validate"))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(map_reqwest_err)?;

        match resp.status() {
            StatusCode::OK => {
                let body: UserIdBody = resp.json().await?;
                Ok(LoginOutcome::Success(body.user_id))
            }
            StatusCode::NOT_FOUND => Ok(LoginOutcome::NoSuchUser),
            StatusCode::UNAUTHORIZED => Ok(LoginOutcome::BadPassword),
            other => Err(UserServiceError::UnexpectedStatus(other)),
        }
    }

    /// spec.md's `Logout(userId)` has no dedicated endpoint in the table
    /// (§6); it is realized as cache invalidation, with session removal
    /// handled by the caller through `master-registry`.
    pub fn logout(&self, user_id: UserId) {
        self.user_by_id.invalidate(&user_id);
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self.user_by_id.get(&id) {
            return Ok(Some(user));
        }

        let resp = self
            .http
            .get(self.url(&format!("users/{id}")))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        match resp.status() {
            StatusCode::OK => {
                let user: User = resp.json().await?;
                self.user_by_id.put(id, user.clone());
                Ok(Some(user))
            }
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(UserServiceError::UnexpectedStatus(other)),
        }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<User>, UserServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("users/byname/{name}")))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        match resp.status() {
            StatusCode::OK => {
                let user: User = resp.json().await?;
                self.user_by_id.put(user.id, user.clone());
                Ok(Some(user))
            }
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(UserServiceError::UnexpectedStatus(other)),
        }
    }

    pub async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserId>, UserServiceError> {
        let resp = self
            .http
            .post(self.url("users/auth/validate"))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(map_reqwest_err)?;

        match resp.status() {
            StatusCode::OK => Ok(Some(resp.json::<UserIdBody>().await?.user_id)),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(None),
            other => Err(UserServiceError::UnexpectedStatus(other)),
        }
    }

    pub async fn validate_password_recovery(
        &self,
        token: &str,
    ) -> Result<Option<UserId>, UserServiceError> {
        let resp = self
            .http
            .post(self.url("users/auth/validate_security"))
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        match resp.status() {
            StatusCode::OK => Ok(Some(resp.json::<UserIdBody>().await?.user_id)),
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(None),
            other => Err(UserServiceError::UnexpectedStatus(other)),
        }
    }

    /// Also the probe's liveness signal (spec.md §4.4).
    pub async fn session_count(&self) -> Result<u32, UserServiceError> {
        if let Some(count) = self.session_count.get(&()) {
            return Ok(count);
        }

        let resp = self
            .http
            .get(self.url("ping"))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() != StatusCode::OK {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }

        let body: PingBody = resp.json().await?;
        self.session_count.put((), body.sessions);
        Ok(body.sessions)
    }

    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let resp = self
            .http
            .post(self.url("users/"))
            .json(&CredentialsBody { username, password })
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() != StatusCode::CREATED {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }

        Ok(resp.json().await?)
    }

    pub async fn set_password(
        &self,
        id: UserId,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let resp = self
            .http
            .put(self.url(&format!("users/{id}")))
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        self.user_by_id.invalidate(&id);

        if resp.status() != StatusCode::OK {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }
        Ok(())
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), UserServiceError> {
        let resp = self
            .http
            .delete(self.url(&format!("users/{id}")))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        self.user_by_id.invalidate(&id);

        if resp.status() != StatusCode::OK {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }
        Ok(())
    }

    pub async fn create_inventory(&self, id: UserId) -> Result<(), UserServiceError> {
        self.post_created(&format!("inventory/{id}")).await
    }

    pub async fn create_cosmetics(&self, id: UserId) -> Result<(), UserServiceError> {
        self.post_created(&format!("inventory/{id}/cosmetics")).await
    }

    pub async fn create_loadouts(&self, id: UserId) -> Result<(), UserServiceError> {
        self.post_created(&format!("inventory/{id}/loadout")).await
    }

    pub async fn create_buy_menu(&self, id: UserId) -> Result<(), UserServiceError> {
        self.post_created(&format!("inventory/{id}/buymenu")).await
    }

    async fn post_created(&self, path: &str) -> Result<(), UserServiceError> {
        let resp = self
            .http
            .post(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() != StatusCode::CREATED {
            debug!(path, status = %resp.status(), "inventory bootstrap call did not return 201");
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }
        Ok(())
    }

    pub async fn get_inventory(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        self.get_bundle(&format!("inventory/{id}")).await
    }

    pub async fn get_cosmetics(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        self.get_bundle(&format!("inventory/{id}/cosmetics")).await
    }

    pub async fn get_loadouts(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        self.get_bundle(&format!("inventory/{id}/loadout")).await
    }

    pub async fn get_buy_menu(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        self.get_bundle(&format!("inventory/{id}/buymenu")).await
    }

    async fn get_bundle(&self, path: &str) -> Result<OpaqueBundle, UserServiceError> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() != StatusCode::OK {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }
        Ok(resp.json().await?)
    }

    pub async fn set_loadout_weapon(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        self.put_bundle(&format!("inventory/{id}/loadout"), payload)
            .await
    }

    pub async fn set_cosmetic_slot(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        self.put_bundle(&format!("inventory/{id}/cosmetics"), payload)
            .await
    }

    pub async fn set_buy_menu(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        self.put_bundle(&format!("inventory/{id}/buymenu"), payload)
            .await
    }

    async fn put_bundle(&self, path: &str, payload: OpaqueBundle) -> Result<(), UserServiceError> {
        let resp = self
            .http
            .put(self.url(path))
            .json(&payload)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if resp.status() != StatusCode::OK {
            return Err(UserServiceError::UnexpectedStatus(resp.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserService for UserServiceClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, UserServiceError> {
        UserServiceClient::login(self, username, password).await
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, UserServiceError> {
        UserServiceClient::get_by_id(self, id).await
    }

    async fn get_inventory(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        UserServiceClient::get_inventory(self, id).await
    }

    async fn get_cosmetics(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        UserServiceClient::get_cosmetics(self, id).await
    }

    async fn get_loadouts(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        UserServiceClient::get_loadouts(self, id).await
    }

    async fn get_buy_menu(&self, id: UserId) -> Result<OpaqueBundle, UserServiceError> {
        UserServiceClient::get_buy_menu(self, id).await
    }

    async fn set_buy_menu(&self, id: UserId, payload: OpaqueBundle) -> Result<(), UserServiceError> {
        UserServiceClient::set_buy_menu(self, id, payload).await
    }

    async fn set_loadout_weapon(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        UserServiceClient::set_loadout_weapon(self, id, payload).await
    }

    async fn set_cosmetic_slot(
        &self,
        id: UserId,
        payload: OpaqueBundle,
    ) -> Result<(), UserServiceError> {
        UserServiceClient::set_cosmetic_slot(self, id, payload).await
    }

    async fn session_count(&self) -> Result<u32, UserServiceError> {
        UserServiceClient::session_count(self).await
    }
}

fn map_reqwest_err(e: reqwest::Error) -> UserServiceError {
    if e.is_timeout() {
        UserServiceError::Timeout
    } else {
        UserServiceError::Transport(e)
    }
}
