//! Admin area: dashboard counters, user list and content management.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime as BsonDateTime;
use serde::{Deserialize, Serialize};

use crate::api::listings::parse_object_id;
use crate::api::pagination::{PageQuery, Pagination, ITEMS_PER_PAGE};
use crate::api::upload::{store_image, ContentForm};
use crate::auth::session::RequireAdmin;
use crate::cache::ContentCache;
use crate::db::ad_repository::AdRepository;
use crate::db::models::{
    AdUpsert, AdminAdView, Advertisement, Category, DashboardStats, Listing, ListingChanges,
    ListingView, UserView,
};
use crate::db::repository::ListingRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::client::ImageHost;
use crate::util::text::{is_blank_or_na, truncate_chars, NOT_AVAILABLE};

/// Promoted ad descriptions are cut to this many characters.
pub const AD_DESCRIPTION_LIMIT: usize = 150;

/// What an admin content route operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Listing(Category),
    Ads,
}

impl ContentKind {
    pub fn parse(slug: &str) -> Result<Self, AppError> {
        if slug == "ads" {
            return Ok(ContentKind::Ads);
        }
        Category::from_slug(slug)
            .map(ContentKind::Listing)
            .ok_or_else(|| AppError::BadRequest("Invalid content type".into()))
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ContentKind::Listing(category) => category.slug(),
            ContentKind::Ads => "ads",
        }
    }

    /// Slug with a leading capital, for user-facing messages.
    fn label(&self) -> String {
        let slug = self.slug();
        let mut chars = slug.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Borrowed handles the admin operations work against.
pub struct AdminContext<'a> {
    pub listings: &'a dyn ListingRepository,
    pub users: &'a dyn UserRepository,
    pub ads: &'a dyn AdRepository,
    pub images: &'a dyn ImageHost,
    pub cache: &'a ContentCache,
}

impl<'a> AdminContext<'a> {
    pub fn from_state(state: &'a AppState) -> Self {
        Self {
            listings: state.listings.as_ref(),
            users: state.users.as_ref(),
            ads: state.ads.as_ref(),
            images: state.images.as_ref(),
            cache: &state.cache,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersPage {
    pub items: Vec<UserView>,
    pub pagination: Pagination,
}

/// A single admin-visible record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdminItem {
    Ad(AdminAdView),
    Listing(ListingView),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentPage {
    pub content_type: String,
    pub items: Vec<AdminItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditView {
    pub content_type: String,
    pub item: AdminItem,
    pub has_ad: bool,
}

/// Body returned by admin write operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

// ---------------------------------------------------------------------------
// Form mapping
// ---------------------------------------------------------------------------

/// Listing attributes that are stored only when the form submits them.
const OPTIONAL_ATTRIBUTES: [&str; 7] = [
    "role",
    "job_type",
    "location",
    "required_experience",
    "organizer",
    "instructor",
    "price",
];

fn first_present(form: &ContentForm, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| form.optional_text(name))
}

/// Build a listing from a submitted form.
///
/// Timestamps, author and image are left to the caller.
pub fn listing_from_form(form: &ContentForm) -> Result<Listing, AppError> {
    let title = first_present(form, &["title", "company_name", "name"])
        .ok_or_else(|| AppError::BadRequest("Title is required".into()))?;
    let link = first_present(form, &["link", "official_link"])
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut listing = Listing::new(title, form.text("description"), link);
    listing_changes_from_form(form).apply(&mut listing);

    Ok(listing)
}

/// The fields an edit form actually submitted.
///
/// A title only changes when a non-blank one is sent. Image and timestamps
/// are left to the caller.
pub fn listing_changes_from_form(form: &ContentForm) -> ListingChanges {
    let mut changes = ListingChanges {
        title: first_present(form, &["title", "company_name", "name"]),
        description: form.submitted_text("description"),
        link: first_present(form, &["link", "official_link"]).or_else(|| {
            ["link", "official_link"]
                .iter()
                .find_map(|name| form.submitted_text(name))
        }),
        requirements: form.raw("requirements").map(|_| form.requirements()),
        certification: form.checkbox("certification"),
        is_project: form.checkbox("is_project"),
        ..Default::default()
    };

    for attribute in OPTIONAL_ATTRIBUTES {
        let value = form.submitted_text(attribute);
        match attribute {
            "role" => changes.role = value,
            "job_type" => changes.job_type = value,
            "location" => changes.location = value,
            "required_experience" => changes.required_experience = value,
            "organizer" => changes.organizer = value,
            "instructor" => changes.instructor = value,
            "price" => changes.price = value,
            _ => {}
        }
    }
    changes
}

/// Build a stand-alone advertisement from a submitted form.
pub fn ad_from_form(form: &ContentForm) -> Result<Advertisement, AppError> {
    let title = first_present(form, &["title"])
        .ok_or_else(|| AppError::BadRequest("Title is required".into()))?;

    Ok(Advertisement {
        id: None,
        title,
        description: form.text("description"),
        image: String::new(),
        link: first_present(form, &["link"]).unwrap_or_else(|| "#".to_string()),
        active: form.checkbox("active"),
        clicks: 0,
        impressions: 0,
        content_type: None,
        content_reference: None,
        posted_at: BsonDateTime::now(),
        updated_at: None,
        admin_id: None,
    })
}

/// The ad that promotes `listing`.
pub fn promoted_ad(category: Category, id: ObjectId, listing: &Listing, admin_id: &str) -> Advertisement {
    let title = if is_blank_or_na(&listing.title) {
        "Opportunity".to_string()
    } else {
        listing.title.clone()
    };
    let summary = listing
        .role
        .as_deref()
        .filter(|role| !is_blank_or_na(role))
        .unwrap_or(&listing.description);
    let link = if is_blank_or_na(&listing.link) {
        "#".to_string()
    } else {
        listing.link.clone()
    };

    Advertisement {
        id: None,
        title,
        description: truncate_chars(summary, AD_DESCRIPTION_LIMIT),
        image: listing.image.clone().unwrap_or_default(),
        link,
        active: true,
        clicks: 0,
        impressions: 0,
        content_type: Some(category),
        content_reference: Some(id),
        posted_at: BsonDateTime::now(),
        updated_at: None,
        admin_id: Some(admin_id.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Site counters, cached for a short while.
pub async fn process_dashboard(ctx: &AdminContext<'_>) -> Result<DashboardStats, AppError> {
    if let Some(stats) = ctx.cache.stats().await {
        return Ok(stats);
    }

    let mut stats = DashboardStats {
        total_users: ctx.users.count().await?,
        total_ads: ctx.ads.count().await?,
        active_ads: ctx.ads.count_active().await?,
        total_ad_clicks: ctx.ads.count_clicks().await?,
        ..Default::default()
    };
    for category in Category::ALL {
        stats.set_listing_count(category, ctx.listings.count(category).await?);
    }

    ctx.cache.store_stats(stats.clone()).await;
    Ok(stats)
}

pub async fn process_users(users: &dyn UserRepository, page: u64) -> Result<UsersPage, AppError> {
    let items = users.page(page, ITEMS_PER_PAGE).await?;
    let total = users.count().await?;

    Ok(UsersPage {
        items: items.iter().map(UserView::from).collect(),
        pagination: Pagination::new(page, total),
    })
}

pub async fn process_content_list(
    ctx: &AdminContext<'_>,
    kind: ContentKind,
    page: u64,
) -> Result<ContentPage, AppError> {
    let (items, total) = match kind {
        ContentKind::Listing(category) => {
            let now = Utc::now();
            let items = ctx.listings.page(category, page, ITEMS_PER_PAGE).await?;
            let items = items
                .iter()
                .map(|l| AdminItem::Listing(ListingView::admin(l, now)))
                .collect();
            (items, ctx.listings.count(category).await?)
        }
        ContentKind::Ads => {
            let items = ctx.ads.page(page, ITEMS_PER_PAGE).await?;
            let items = items
                .iter()
                .map(|ad| AdminItem::Ad(AdminAdView::from(ad)))
                .collect();
            (items, ctx.ads.count().await?)
        }
    };

    Ok(ContentPage {
        content_type: kind.slug().to_string(),
        items,
        pagination: Pagination::new(page, total),
    })
}

/// Create a record from `form`. Returns the new id and a status message.
pub async fn process_add(
    ctx: &AdminContext<'_>,
    kind: ContentKind,
    form: ContentForm,
    admin_id: &str,
) -> Result<(ObjectId, String), AppError> {
    let label = kind.label();
    let mut message = format!("{label} added successfully!");

    let id = match kind {
        ContentKind::Listing(category) => {
            let mut listing = listing_from_form(&form)?;
            listing.admin_id = Some(admin_id.to_string());
            listing.posted_at = BsonDateTime::now();
            listing.image = store_image(ctx.images, form.image.clone()).await;

            let id = ctx.listings.insert(category, listing.clone()).await?;
            ctx.cache.invalidate_all();

            if category.is_promotable() && form.checkbox("promote_as_ad") {
                let ad = promoted_ad(category, id, &listing, admin_id);
                match ctx.ads.upsert_for_content(ad).await {
                    Ok(_) => {
                        tracing::info!(category = %category, id = %id, "listing promoted as ad")
                    }
                    Err(e) => {
                        tracing::warn!(
                            category = %category,
                            id = %id,
                            error = %e,
                            "listing saved but promotion failed"
                        );
                        message = format!("{label} added, but promoting it as an ad failed");
                    }
                }
            }
            id
        }
        ContentKind::Ads => {
            let mut ad = ad_from_form(&form)?;
            ad.admin_id = Some(admin_id.to_string());
            ad.image = store_image(ctx.images, form.image.clone())
                .await
                .unwrap_or_default();
            let id = ctx.ads.insert(ad).await?;
            ctx.cache.invalidate_all();
            id
        }
    };

    tracing::info!(content_type = kind.slug(), id = %id, admin_id = %admin_id, "content added");
    Ok((id, message))
}

pub async fn process_edit_view(
    ctx: &AdminContext<'_>,
    kind: ContentKind,
    raw_id: &str,
) -> Result<EditView, AppError> {
    let id = parse_object_id(raw_id)?;
    let not_found = || AppError::NotFound("Content not found".into());

    let (item, has_ad) = match kind {
        ContentKind::Listing(category) => {
            let listing = ctx.listings.find(category, id).await?.ok_or_else(not_found)?;
            let has_ad = category.is_promotable()
                && ctx.ads.find_by_content(category, id).await?.is_some();
            (AdminItem::Listing(ListingView::admin(&listing, Utc::now())), has_ad)
        }
        ContentKind::Ads => {
            let ad = ctx.ads.find(id).await?.ok_or_else(not_found)?;
            (AdminItem::Ad(AdminAdView::from(&ad)), false)
        }
    };

    Ok(EditView {
        content_type: kind.slug().to_string(),
        item,
        has_ad,
    })
}

/// Update a record from `form`. Returns a message describing what happened.
pub async fn process_edit(
    ctx: &AdminContext<'_>,
    kind: ContentKind,
    raw_id: &str,
    form: ContentForm,
    admin_id: &str,
) -> Result<String, AppError> {
    let id = parse_object_id(raw_id)?;
    let not_found = || AppError::NotFound("Content not found".into());
    let label = kind.label();

    let message = match kind {
        ContentKind::Listing(category) => {
            let mut listing = ctx.listings.find(category, id).await?.ok_or_else(not_found)?;

            let mut changes = listing_changes_from_form(&form);
            changes.image = store_image(ctx.images, form.image.clone()).await;
            changes.updated_at = Some(BsonDateTime::now());

            if !ctx.listings.update(category, id, &changes).await? {
                return Err(not_found());
            }
            ctx.cache.invalidate_all();
            changes.apply(&mut listing);

            if !category.is_promotable() {
                format!("{label} updated successfully!")
            } else if form.checkbox("promote_as_ad") {
                let ad = promoted_ad(category, id, &listing, admin_id);
                match ctx.ads.upsert_for_content(ad).await? {
                    AdUpsert::Updated => format!("{label} and ad updated successfully!"),
                    AdUpsert::Created => format!("{label} updated and ad created!"),
                }
            } else if ctx.ads.delete_by_content(category, id).await? > 0 {
                format!("{label} updated (ad removed)!")
            } else {
                format!("{label} updated successfully!")
            }
        }
        ContentKind::Ads => {
            let existing = ctx.ads.find(id).await?.ok_or_else(not_found)?;

            let mut ad = ad_from_form(&form)?;
            ad.clicks = existing.clicks;
            ad.impressions = existing.impressions;
            ad.content_type = existing.content_type;
            ad.content_reference = existing.content_reference;
            ad.posted_at = existing.posted_at;
            ad.admin_id = existing.admin_id.clone();
            ad.updated_at = Some(BsonDateTime::now());
            ad.image = store_image(ctx.images, form.image.clone())
                .await
                .unwrap_or(existing.image);

            if !ctx.ads.replace(id, ad).await? {
                return Err(not_found());
            }
            format!("{label} updated successfully!")
        }
    };

    ctx.cache.invalidate_all();
    tracing::info!(content_type = kind.slug(), id = %id, admin_id = %admin_id, "content updated");
    Ok(message)
}

/// Delete a record; listings also lose every ad promoting them.
pub async fn process_delete(
    ctx: &AdminContext<'_>,
    kind: ContentKind,
    raw_id: &str,
) -> Result<String, AppError> {
    let id = parse_object_id(raw_id)?;

    let deleted = match kind {
        ContentKind::Listing(category) => {
            let deleted = ctx.listings.delete(category, id).await?;
            if deleted {
                let removed_ads = ctx.ads.delete_by_content(category, id).await?;
                if removed_ads > 0 {
                    tracing::info!(id = %id, removed_ads, "removed ads of deleted listing");
                }
            }
            deleted
        }
        ContentKind::Ads => ctx.ads.delete(id).await?,
    };

    if !deleted {
        return Err(AppError::NotFound("Content not found".into()));
    }

    ctx.cache.invalidate_all();
    tracing::info!(content_type = kind.slug(), id = %id, "content deleted");
    Ok(format!("{} deleted successfully!", kind.label()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /admin/dashboard`
pub async fn dashboard_handler(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    process_dashboard(&AdminContext::from_state(&state))
        .await
        .map(Json)
}

/// `GET /admin/users`
pub async fn users_handler(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UsersPage>, AppError> {
    process_users(state.users.as_ref(), query.page())
        .await
        .map(Json)
}

/// `GET /admin/content/{type}`
pub async fn content_handler(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ContentPage>, AppError> {
    let kind = ContentKind::parse(&content_type)?;
    process_content_list(&AdminContext::from_state(&state), kind, query.page())
        .await
        .map(Json)
}

/// `POST /admin/add/{type}`
pub async fn add_handler(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(content_type): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<WriteResponse>), AppError> {
    let kind = ContentKind::parse(&content_type)?;
    let form = ContentForm::from_multipart(multipart).await?;

    let (id, message) =
        process_add(&AdminContext::from_state(&state), kind, form, &admin.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(WriteResponse {
            message,
            id: Some(id.to_hex()),
        }),
    ))
}

/// `GET /admin/edit/{type}/{id}`
pub async fn edit_view_handler(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> Result<Json<EditView>, AppError> {
    let kind = ContentKind::parse(&content_type)?;
    process_edit_view(&AdminContext::from_state(&state), kind, &id)
        .await
        .map(Json)
}

/// `POST /admin/edit/{type}/{id}`
pub async fn edit_handler(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<WriteResponse>, AppError> {
    let kind = ContentKind::parse(&content_type)?;
    let form = ContentForm::from_multipart(multipart).await?;

    let message =
        process_edit(&AdminContext::from_state(&state), kind, &id, form, &admin.user_id).await?;

    Ok(Json(WriteResponse {
        message,
        id: Some(id),
    }))
}

/// `POST /admin/delete/{type}/{id}`
pub async fn delete_handler(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> Result<Json<WriteResponse>, AppError> {
    let kind = ContentKind::parse(&content_type)?;
    let message = process_delete(&AdminContext::from_state(&state), kind, &id).await?;

    Ok(Json(WriteResponse {
        message,
        id: Some(id),
    }))
}
