use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::cache::ContentCache;
use crate::db::ad_repository::AdRepository;
use crate::db::repository::ListingRepository;
use crate::db::user_repository::UserRepository;
use crate::storage::client::ImageHost;

/// Credentials of the built-in administrator account.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub listings: Arc<dyn ListingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub ads: Arc<dyn AdRepository>,
    pub images: Arc<dyn ImageHost>,
    pub cache: ContentCache,
    pub admin: AdminCredentials,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
