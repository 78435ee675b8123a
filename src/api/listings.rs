use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::Json;
use chrono::{Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::api::pagination::{clamp_page, PageQuery, Pagination, ITEMS_PER_PAGE};
use crate::auth::session::RequireUser;
use crate::cache::{ContentCache, ListingPage};
use crate::db::models::{Category, ListingFilter, ListingView};
use crate::db::repository::ListingRepository;
use crate::error::AppError;
use crate::state::AppState;

/// Number of related items shown on a detail page.
pub const RELATED_LIMIT: i64 = 3;

/// A page of listings with navigation metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingPageResponse {
    pub items: Vec<ListingView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub content_type: String,
    pub item: ListingView,
    pub related: Vec<ListingView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub redirect_url: String,
}

/// Query parameters of `GET /api/filter/{category}`. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub location: Option<String>,
    pub price: Option<String>,
    /// `24h`, `week` or `month`.
    pub date: Option<String>,
    pub job_type: Option<String>,
    pub experience: Option<String>,
    pub page: Option<u64>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl FilterQuery {
    pub fn to_filter(&self, now: chrono::DateTime<Utc>) -> ListingFilter {
        let posted_since = match self.date.as_deref().map(str::trim) {
            Some("24h") => Some(now - Duration::hours(24)),
            Some("week") => Some(now - Duration::days(7)),
            Some("month") => Some(now - Duration::days(30)),
            _ => None,
        };

        ListingFilter {
            location: non_blank(&self.location),
            price: non_blank(&self.price),
            posted_since,
            job_type: non_blank(&self.job_type),
            required_experience: non_blank(&self.experience),
        }
    }
}

/// Parse a hex ObjectId from a path segment.
pub fn parse_object_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid id '{raw}'")))
}

/// Resolve the singular kind used by detail and apply routes.
fn detail_kind(kind: &str) -> Result<Category, AppError> {
    Category::from_singular(kind)
        .filter(Category::is_searchable)
        .ok_or_else(|| AppError::BadRequest("Invalid content type".into()))
}

/// Load one page of a category, serving from `cache` when possible.
pub async fn process_listing_page(
    listings: &dyn ListingRepository,
    cache: &ContentCache,
    category: Category,
    page: u64,
) -> Result<ListingPageResponse, AppError> {
    let cached = match cache.page(category, page).await {
        Some(hit) => hit,
        None => {
            let items = listings.page(category, page, ITEMS_PER_PAGE).await?;
            let total = listings.count(category).await?;
            cache
                .store_page(category, page, ListingPage { items, total })
                .await
        }
    };

    let now = Utc::now();
    Ok(ListingPageResponse {
        items: cached
            .items
            .iter()
            .map(|l| ListingView::public(l, now))
            .collect(),
        pagination: Pagination::new(page, cached.total),
    })
}

pub async fn process_detail(
    listings: &dyn ListingRepository,
    kind: &str,
    raw_id: &str,
) -> Result<DetailResponse, AppError> {
    let category = detail_kind(kind)?;
    let id = parse_object_id(raw_id)?;

    let item = listings
        .find(category, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Content not found".into()))?;

    let job_type = match category {
        Category::Jobs => item.job_type.clone(),
        _ => None,
    };
    let related = listings
        .related(category, id, job_type, RELATED_LIMIT)
        .await?;

    let now = Utc::now();
    Ok(DetailResponse {
        content_type: kind.to_string(),
        item: ListingView::public(&item, now),
        related: related.iter().map(|l| ListingView::public(l, now)).collect(),
    })
}

pub async fn process_apply(
    listings: &dyn ListingRepository,
    kind: &str,
    raw_id: &str,
) -> Result<ApplyResponse, AppError> {
    let category = detail_kind(kind)?;
    let id = parse_object_id(raw_id)?;

    let item = listings
        .find(category, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Content not found".into()))?;

    let redirect_url = if crate::util::text::is_blank_or_na(&item.link) {
        "#".to_string()
    } else {
        item.link
    };
    Ok(ApplyResponse { redirect_url })
}

pub async fn process_filter(
    listings: &dyn ListingRepository,
    slug: &str,
    query: &FilterQuery,
) -> Result<ListingPageResponse, AppError> {
    let category = Category::from_slug(slug)
        .filter(Category::is_searchable)
        .ok_or_else(|| AppError::BadRequest("Invalid content type".into()))?;

    let now = Utc::now();
    let page = clamp_page(query.page);
    let (items, total) = listings
        .filter(category, &query.to_filter(now), page, ITEMS_PER_PAGE)
        .await?;

    Ok(ListingPageResponse {
        items: items.iter().map(|l| ListingView::public(l, now)).collect(),
        pagination: Pagination::new(page, total),
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /` sends visitors to the jobs board.
pub async fn index_handler() -> Redirect {
    Redirect::to("/jobs")
}

async fn page_for(
    state: &AppState,
    category: Category,
    query: PageQuery,
) -> Result<Json<ListingPageResponse>, AppError> {
    process_listing_page(state.listings.as_ref(), &state.cache, category, query.page())
        .await
        .map(Json)
}

pub async fn jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Jobs, query).await
}

pub async fn workshops_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Workshops, query).await
}

pub async fn courses_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Courses, query).await
}

pub async fn hackathons_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Hackathons, query).await
}

/// Roadmaps are only visible to logged-in users.
pub async fn roadmaps_handler(
    RequireUser(_user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Roadmaps, query).await
}

pub async fn websites_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    page_for(&state, Category::Websites, query).await
}

/// `GET /our-projects`
pub async fn projects_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListingView>>, AppError> {
    let now = Utc::now();
    let projects = state.listings.projects().await?;
    Ok(Json(
        projects.iter().map(|l| ListingView::public(l, now)).collect(),
    ))
}

/// `GET /detail/{kind}/{id}`
pub async fn detail_handler(
    RequireUser(_user): RequireUser,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<DetailResponse>, AppError> {
    process_detail(state.listings.as_ref(), &kind, &id)
        .await
        .map(Json)
}

/// `POST /apply/{kind}/{id}`
pub async fn apply_handler(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ApplyResponse>, AppError> {
    let response = process_apply(state.listings.as_ref(), &kind, &id).await?;
    tracing::info!(user_id = %user.user_id, kind = %kind, id = %id, "apply redirect issued");
    Ok(Json(response))
}

/// `GET /api/filter/{category}`
pub async fn filter_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ListingPageResponse>, AppError> {
    process_filter(state.listings.as_ref(), &category, &query)
        .await
        .map(Json)
}
