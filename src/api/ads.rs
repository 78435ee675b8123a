use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

use crate::auth::session::MaybeUser;
use crate::db::ad_repository::AdRepository;
use crate::db::models::{AdClick, AdView};
use crate::state::AppState;

/// Number of ads returned by one rotation request.
pub const ADS_PER_ROTATION: u64 = 5;

/// Body of the impression and click tracking endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            error: Some(message.to_string()),
        }
    }
}

/// A tracked interaction with an ad.
#[derive(Debug, Clone)]
pub enum AdEvent {
    Impression,
    Click {
        user_id: Option<String>,
        ip_address: Option<String>,
    },
}

/// Best-effort client address: first `X-Forwarded-For` hop, else the peer address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(ClientIp(forwarded.or_else(peer)))
    }
}

/// Pick a random set of active ads for display.
///
/// Storage errors are logged and produce an empty rotation.
pub async fn process_get_ads(ads: &dyn AdRepository) -> Vec<AdView> {
    match ads.sample_active(ADS_PER_ROTATION).await {
        Ok(sample) => sample.iter().map(AdView::from).collect(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load ads");
            Vec::new()
        }
    }
}

/// Record one impression or click against the ad with hex id `raw_id`.
pub async fn process_ad_event(
    ads: &dyn AdRepository,
    raw_id: &str,
    event: AdEvent,
) -> (StatusCode, TrackResponse) {
    let Ok(id) = ObjectId::parse_str(raw_id) else {
        return (StatusCode::BAD_REQUEST, TrackResponse::failed("Invalid ad ID"));
    };

    let result = match event {
        AdEvent::Impression => ads.record_impression(id).await,
        AdEvent::Click {
            user_id,
            ip_address,
        } => {
            let click = AdClick {
                id: None,
                ad_id: id,
                clicked_at: BsonDateTime::now(),
                user_id,
                ip_address,
            };
            ads.record_click(id, click).await
        }
    };

    match result {
        Ok(true) => (StatusCode::OK, TrackResponse::ok()),
        Ok(false) => (StatusCode::NOT_FOUND, TrackResponse::failed("Ad not found")),
        Err(e) => {
            tracing::error!(ad_id = %raw_id, error = %e, "ad tracking failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                TrackResponse::failed("Server error"),
            )
        }
    }
}

/// `GET /api/get-ads`
pub async fn get_ads_handler(State(state): State<AppState>) -> Json<Vec<AdView>> {
    Json(process_get_ads(state.ads.as_ref()).await)
}

/// `POST /ad/impression/{id}`
pub async fn impression_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<TrackResponse>) {
    let (status, body) = process_ad_event(state.ads.as_ref(), &id, AdEvent::Impression).await;
    (status, Json(body))
}

/// `POST /ad/click/{id}`
pub async fn click_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ClientIp(ip_address): ClientIp,
    Path(id): Path<String>,
) -> (StatusCode, Json<TrackResponse>) {
    let event = AdEvent::Click {
        user_id: user.map(|u| u.user_id),
        ip_address,
    };
    let (status, body) = process_ad_event(state.ads.as_ref(), &id, event).await;
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryAdRepository;
    use crate::db::models::Advertisement;
    use crate::error::AppError;
    use async_trait::async_trait;
    use axum::http::Request;

    fn ad(active: bool) -> Advertisement {
        Advertisement {
            id: None,
            title: "Acme".to_string(),
            description: String::new(),
            image: String::new(),
            link: String::new(),
            active,
            clicks: 0,
            impressions: 0,
            content_type: None,
            content_reference: None,
            posted_at: BsonDateTime::now(),
            updated_at: None,
            admin_id: None,
        }
    }

    /// Fails every call, to exercise error paths.
    struct BrokenAds;

    #[async_trait]
    impl AdRepository for BrokenAds {
        async fn sample_active(&self, _: u64) -> Result<Vec<Advertisement>, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn record_impression(&self, _: ObjectId) -> Result<bool, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn record_click(&self, _: ObjectId, _: AdClick) -> Result<bool, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn insert(&self, _: Advertisement) -> Result<ObjectId, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn find(&self, _: ObjectId) -> Result<Option<Advertisement>, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn replace(&self, _: ObjectId, _: Advertisement) -> Result<bool, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn delete(&self, _: ObjectId) -> Result<bool, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn page(&self, _: u64, _: u64) -> Result<Vec<Advertisement>, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn find_by_content(
            &self,
            _: crate::db::models::Category,
            _: ObjectId,
        ) -> Result<Option<Advertisement>, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn upsert_for_content(
            &self,
            _: Advertisement,
        ) -> Result<crate::db::models::AdUpsert, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn delete_by_content(
            &self,
            _: crate::db::models::Category,
            _: ObjectId,
        ) -> Result<u64, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn count(&self) -> Result<u64, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn count_active(&self) -> Result<u64, AppError> {
            Err(AppError::Database("offline".into()))
        }
        async fn count_clicks(&self) -> Result<u64, AppError> {
            Err(AppError::Database("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_ids() {
        let repo = InMemoryAdRepository::new();

        let (status, body) = process_ad_event(&repo, "xyz", AdEvent::Impression).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.as_deref(), Some("Invalid ad ID"));

        let (status, body) =
            process_ad_event(&repo, &ObjectId::new().to_hex(), AdEvent::Impression).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.as_deref(), Some("Ad not found"));
    }

    #[tokio::test]
    async fn test_click_logs_user_and_ip() {
        let repo = InMemoryAdRepository::new();
        let id = repo.insert(ad(true)).await.unwrap();

        let event = AdEvent::Click {
            user_id: Some("u1".to_string()),
            ip_address: Some("203.0.113.7".to_string()),
        };
        let (status, body) = process_ad_event(&repo, &id.to_hex(), event).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.success);

        let clicks = repo.clicks();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].ad_id, id);
        assert_eq!(clicks[0].user_id.as_deref(), Some("u1"));
        assert_eq!(clicks[0].ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(repo.find(id).await.unwrap().unwrap().clicks, 1);
    }

    #[tokio::test]
    async fn test_storage_failures() {
        let (status, body) =
            process_ad_event(&BrokenAds, &ObjectId::new().to_hex(), AdEvent::Impression).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.as_deref(), Some("Server error"));

        assert!(process_get_ads(&BrokenAds).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_ads_only_active() {
        let repo = InMemoryAdRepository::new();
        repo.insert(ad(false)).await.unwrap();
        repo.insert(ad(true)).await.unwrap();

        let ads = process_get_ads(&repo).await;
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].link, "#");
    }

    #[tokio::test]
    async fn test_client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.as_deref(), Some("198.51.100.4"));

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.as_deref(), Some("127.0.0.1"));
    }
}
