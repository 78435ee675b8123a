use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::models::{Category, ListingView};
use crate::db::repository::ListingRepository;
use crate::error::AppError;
use crate::state::AppState;

/// Maximum hits returned per category.
pub const HITS_PER_CATEGORY: i64 = 5;

/// Query parameters for the global search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// A search hit, tagged with the singular kind of its category.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub item: ListingView,
}

/// Core search logic.
///
/// Hits are grouped by category in a fixed order: jobs, workshops, courses, hackathons.
/// A failing category is logged and skipped so one broken collection does not
/// hide results from the others.
pub async fn process_search(
    listings: &dyn ListingRepository,
    query: &str,
) -> Result<Vec<SearchHit>, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let mut hits = Vec::new();
    for category in Category::SEARCHABLE {
        match listings.search(category, query, HITS_PER_CATEGORY).await {
            Ok(found) => hits.extend(found.iter().map(|l| SearchHit {
                kind: category.singular().to_string(),
                item: ListingView::public(l, now),
            })),
            Err(e) => tracing::error!(category = %category, error = %e, "search failed"),
        }
    }

    Ok(hits)
}

/// Axum handler for `GET /api/search?q=`.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    process_search(state.listings.as_ref(), &params.q)
        .await
        .map(Json)
}
