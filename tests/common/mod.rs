#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;

use campus_hub::app::{build_router, RouterOptions};
use campus_hub::auth::session::derive_key;
use campus_hub::cache::ContentCache;
use campus_hub::db::memory::{InMemoryAdRepository, InMemoryListingRepository, InMemoryUserRepository};
use campus_hub::error::AppError;
use campus_hub::state::{AdminCredentials, AppState};
use campus_hub::storage::client::{ImageHost, ImageUpload};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "test-admin-pass";

/// Image host that records uploads instead of sending them anywhere.
#[derive(Default)]
pub struct RecordingImageHost {
    uploads: Mutex<Vec<ImageUpload>>,
}

impl RecordingImageHost {
    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads.lock().expect("uploads lock").clone()
    }
}

#[async_trait]
impl ImageHost for RecordingImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<String, AppError> {
        let url = format!("https://images.test/{}", image.file_name);
        self.uploads.lock().expect("uploads lock").push(image);
        Ok(url)
    }
}

/// Full router over in-memory repositories.
///
/// The repositories are shared with the router so tests can seed and inspect
/// storage directly.
pub struct TestEnv {
    pub router: Router,
    pub listings: Arc<InMemoryListingRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub ads: Arc<InMemoryAdRepository>,
    pub images: Arc<RecordingImageHost>,
}

impl TestEnv {
    /// Router without rate limiting.
    pub fn start() -> Self {
        Self::with_options(RouterOptions {
            rate_limit_enabled: false,
            ..RouterOptions::default()
        })
    }

    pub fn with_options(options: RouterOptions) -> Self {
        let listings = Arc::new(InMemoryListingRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let ads = Arc::new(InMemoryAdRepository::new());
        let images = Arc::new(RecordingImageHost::default());

        let state = AppState {
            listings: listings.clone(),
            users: users.clone(),
            ads: ads.clone(),
            images: images.clone(),
            cache: ContentCache::default(),
            admin: AdminCredentials {
                username: ADMIN_USERNAME.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            },
            cookie_key: derive_key("integration-test-secret"),
        };

        Self {
            router: build_router(state, &options),
            listings,
            users,
            ads,
            images,
        }
    }

    /// A `TestServer` that keeps cookies and expects 2xx responses.
    pub fn server(&self) -> TestServer {
        TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// A `TestServer` that does not expect success (for error and redirect tests).
    pub fn server_permissive(&self) -> TestServer {
        TestServer::builder()
            .save_cookies()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// A `TestServer` over a real socket, so handlers and rate limits see a
    /// peer address (always 127.0.0.1).
    pub fn server_with_peer_addr(&self) -> TestServer {
        TestServer::builder()
            .save_cookies()
            .try_build(
                self.router
                    .clone()
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .expect("Failed to build TestServer")
    }
}

pub fn forwarded_for(ip: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    )
}

pub async fn login_admin(server: &TestServer) {
    server
        .post("/login")
        .form(&serde_json::json!({
            "email": ADMIN_USERNAME,
            "password": ADMIN_PASSWORD,
        }))
        .await
        .assert_status_ok();
}

/// Register (and thereby log in) a regular member.
pub async fn register_member(server: &TestServer, email: &str) -> axum_test::TestResponse {
    server
        .post("/register")
        .form(&serde_json::json!({
            "name": "Asha",
            "email": email,
            "password": "secret1",
            "college": "IIT Madras",
            "phone": "9876543210",
        }))
        .await
}
