//! Router assembly: every route plus the middleware stack.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor};
use tower_governor::GovernorLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::{admin, ads, listings, search};
use crate::auth::handlers as auth;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Public listing pages may be cached by browsers and proxies for this long.
pub const LISTING_CACHE_CONTROL: &str = "public, max-age=300";

/// A token bucket: one request replenished every `period`, up to `burst` at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub period: Duration,
    pub burst: u32,
}

/// 200 requests per day for every client.
pub const DAILY_LIMIT: RateLimit = RateLimit {
    period: Duration::from_secs(432),
    burst: 200,
};

/// 50 requests per hour for every client.
pub const GLOBAL_LIMIT: RateLimit = RateLimit {
    period: Duration::from_secs(72),
    burst: 50,
};

/// 10 login attempts per minute.
pub const LOGIN_LIMIT: RateLimit = RateLimit {
    period: Duration::from_secs(6),
    burst: 10,
};

/// 5 registrations per minute.
pub const REGISTER_LIMIT: RateLimit = RateLimit {
    period: Duration::from_secs(12),
    burst: 5,
};

/// Router-level settings that do not belong in the shared state.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub rate_limit_enabled: bool,
    /// Key rate limits on forwarding headers instead of the peer address.
    pub trust_proxy_headers: bool,
    pub cors_permissive: bool,
    pub max_upload_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            trust_proxy_headers: false,
            cors_permissive: true,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl From<&AppConfig> for RouterOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            rate_limit_enabled: config.rate_limit_enabled,
            trust_proxy_headers: config.trust_proxy_headers,
            cors_permissive: config.cors_permissive,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Wrap `router` in a per-client token bucket.
///
/// Clients are keyed by peer address unless `trust_proxy_headers` is set,
/// in which case forwarding headers are believed.
fn rate_limited(
    router: Router<AppState>,
    limit: RateLimit,
    trust_proxy_headers: bool,
) -> Router<AppState> {
    let mut builder = GovernorConfigBuilder::default();
    builder.period(limit.period).burst_size(limit.burst);

    let limited = if trust_proxy_headers {
        builder
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .map(|config| router.clone().layer(GovernorLayer::new(Arc::new(config))))
    } else {
        builder
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .map(|config| router.clone().layer(GovernorLayer::new(Arc::new(config))))
    };

    match limited {
        Some(limited) => limited,
        None => {
            tracing::warn!(?limit, "invalid rate limit, serving without it");
            router
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

/// Build the application router.
pub fn build_router(state: AppState, options: &RouterOptions) -> Router {
    let public_listings = Router::new()
        .route("/jobs", get(listings::jobs_handler))
        .route("/workshops", get(listings::workshops_handler))
        .route("/courses", get(listings::courses_handler))
        .route("/hackathons", get(listings::hackathons_handler))
        .route("/websites", get(listings::websites_handler))
        .route("/our-projects", get(listings::projects_handler))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static(LISTING_CACHE_CONTROL),
        ));

    let mut login = Router::new().route(
        "/login",
        get(auth::auth_page_handler).post(auth::login_handler),
    );
    let mut register = Router::new().route(
        "/register",
        get(auth::auth_page_handler).post(auth::register_handler),
    );
    if options.rate_limit_enabled {
        login = rate_limited(login, LOGIN_LIMIT, options.trust_proxy_headers);
        register = rate_limited(register, REGISTER_LIMIT, options.trust_proxy_headers);
    }

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard_handler))
        .route("/users", get(admin::users_handler))
        .route("/content/{content_type}", get(admin::content_handler))
        .route("/add/{content_type}", post(admin::add_handler))
        .route(
            "/edit/{content_type}/{id}",
            get(admin::edit_view_handler).post(admin::edit_handler),
        )
        .route("/delete/{content_type}/{id}", post(admin::delete_handler));

    let mut router = Router::new()
        .route("/", get(listings::index_handler))
        .merge(public_listings)
        .route("/roadmaps", get(listings::roadmaps_handler))
        .route("/detail/{kind}/{id}", get(listings::detail_handler))
        .route("/apply/{kind}/{id}", post(listings::apply_handler))
        .route("/api/filter/{category}", get(listings::filter_handler))
        .route("/api/search", get(search::search_handler))
        .route("/api/get-ads", get(ads::get_ads_handler))
        .route("/ad/impression/{id}", post(ads::impression_handler))
        .route("/ad/click/{id}", post(ads::click_handler))
        .merge(login)
        .merge(register)
        .route("/logout", get(auth::logout_handler))
        .route("/dashboard", get(auth::user_dashboard_handler))
        .nest("/admin", admin_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(options.max_upload_bytes));

    if options.rate_limit_enabled {
        router = rate_limited(router, GLOBAL_LIMIT, options.trust_proxy_headers);
        router = rate_limited(router, DAILY_LIMIT, options.trust_proxy_headers);
    }
    if options.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
