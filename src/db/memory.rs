//! In-memory repositories backing demo mode and the integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime as BsonDateTime;

use crate::api::pagination::skip_for;
use crate::db::ad_repository::AdRepository;
use crate::db::models::{
    AdClick, AdUpsert, Advertisement, Category, Listing, ListingChanges, ListingFilter, User,
};
use crate::db::repository::ListingRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

fn page_of<T: Clone>(items: &[T], page: u64, per_page: u64) -> Vec<T> {
    let skip = usize::try_from(skip_for(page, per_page)).unwrap_or(usize::MAX);
    items
        .iter()
        .skip(skip)
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn lock_poisoned<T>(_: T) -> AppError {
    AppError::Internal("in-memory store lock poisoned".into())
}

#[derive(Default)]
pub struct InMemoryListingRepository {
    listings: Mutex<HashMap<Category, Vec<Listing>>>,
}

impl InMemoryListingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All listings of a category, newest first.
    fn sorted(&self, category: Category) -> Result<Vec<Listing>, AppError> {
        let store = self.listings.lock().map_err(lock_poisoned)?;
        let mut items = store.get(&category).cloned().unwrap_or_default();
        items.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(items)
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn page(
        &self,
        category: Category,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<Listing>, AppError> {
        Ok(page_of(&self.sorted(category)?, page, per_page))
    }

    async fn count(&self, category: Category) -> Result<u64, AppError> {
        let store = self.listings.lock().map_err(lock_poisoned)?;
        Ok(store.get(&category).map_or(0, |items| items.len() as u64))
    }

    async fn find(&self, category: Category, id: ObjectId) -> Result<Option<Listing>, AppError> {
        let store = self.listings.lock().map_err(lock_poisoned)?;
        Ok(store
            .get(&category)
            .and_then(|items| items.iter().find(|l| l.id == Some(id)).cloned()))
    }

    async fn insert(&self, category: Category, mut listing: Listing) -> Result<ObjectId, AppError> {
        let id = ObjectId::new();
        listing.id = Some(id);

        let mut store = self.listings.lock().map_err(lock_poisoned)?;
        store.entry(category).or_default().push(listing);
        Ok(id)
    }

    async fn update(
        &self,
        category: Category,
        id: ObjectId,
        changes: &ListingChanges,
    ) -> Result<bool, AppError> {
        let mut store = self.listings.lock().map_err(lock_poisoned)?;
        let slot = store
            .get_mut(&category)
            .and_then(|items| items.iter_mut().find(|l| l.id == Some(id)));

        match slot {
            Some(existing) => {
                changes.apply(existing);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, category: Category, id: ObjectId) -> Result<bool, AppError> {
        let mut store = self.listings.lock().map_err(lock_poisoned)?;
        let Some(items) = store.get_mut(&category) else {
            return Ok(false);
        };

        let before = items.len();
        items.retain(|l| l.id != Some(id));
        Ok(items.len() < before)
    }

    async fn related(
        &self,
        category: Category,
        exclude: ObjectId,
        job_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError> {
        Ok(self
            .sorted(category)?
            .into_iter()
            .filter(|l| l.id != Some(exclude))
            .filter(|l| job_type.is_none() || l.job_type == job_type)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn projects(&self) -> Result<Vec<Listing>, AppError> {
        Ok(self
            .sorted(Category::Websites)?
            .into_iter()
            .filter(|l| l.is_project)
            .collect())
    }

    async fn search(
        &self,
        category: Category,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError> {
        let needle = query.to_lowercase();
        let fields = category.search_fields();

        Ok(self
            .sorted(category)?
            .into_iter()
            .filter(|l| {
                fields
                    .iter()
                    .filter_map(|f| l.field(f))
                    .any(|value| value.to_lowercase().contains(&needle))
            })
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn filter(
        &self,
        category: Category,
        filter: &ListingFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Listing>, u64), AppError> {
        let matching: Vec<Listing> = self
            .sorted(category)?
            .into_iter()
            .filter(|l| filter.matches(l))
            .collect();

        let total = matching.len() as u64;
        Ok((page_of(&matching, page, per_page), total))
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.users.lock().map_err(lock_poisoned)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        let users = self.users.lock().map_err(lock_poisoned)?;
        Ok(users.iter().find(|u| u.id == Some(id)).cloned())
    }

    async fn insert(&self, mut user: User) -> Result<ObjectId, AppError> {
        let mut users = self.users.lock().map_err(lock_poisoned)?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let id = ObjectId::new();
        user.id = Some(id);
        users.push(user);
        Ok(id)
    }

    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<User>, AppError> {
        let mut users = self.users.lock().map_err(lock_poisoned)?.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(&users, page, per_page))
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.users.lock().map_err(lock_poisoned)?.len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryAdRepository {
    ads: Mutex<Vec<Advertisement>>,
    clicks: Mutex<Vec<AdClick>>,
}

impl InMemoryAdRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the click log.
    pub fn clicks(&self) -> Vec<AdClick> {
        self.clicks.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AdRepository for InMemoryAdRepository {
    async fn sample_active(&self, size: u64) -> Result<Vec<Advertisement>, AppError> {
        use rand::seq::IndexedRandom;

        let ads = self.ads.lock().map_err(lock_poisoned)?;
        let active: Vec<&Advertisement> = ads.iter().filter(|a| a.active).collect();

        let sample = active
            .choose_multiple(&mut rand::rng(), size as usize)
            .map(|ad| (*ad).clone())
            .collect();
        Ok(sample)
    }

    async fn record_impression(&self, id: ObjectId) -> Result<bool, AppError> {
        let mut ads = self.ads.lock().map_err(lock_poisoned)?;
        match ads.iter_mut().find(|a| a.id == Some(id)) {
            Some(ad) => {
                ad.impressions += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_click(&self, id: ObjectId, mut click: AdClick) -> Result<bool, AppError> {
        {
            let mut ads = self.ads.lock().map_err(lock_poisoned)?;
            let Some(ad) = ads.iter_mut().find(|a| a.id == Some(id)) else {
                return Ok(false);
            };
            ad.clicks += 1;
        }

        click.id.get_or_insert_with(ObjectId::new);
        self.clicks.lock().map_err(lock_poisoned)?.push(click);
        Ok(true)
    }

    async fn insert(&self, mut ad: Advertisement) -> Result<ObjectId, AppError> {
        let id = ObjectId::new();
        ad.id = Some(id);
        self.ads.lock().map_err(lock_poisoned)?.push(ad);
        Ok(id)
    }

    async fn find(&self, id: ObjectId) -> Result<Option<Advertisement>, AppError> {
        let ads = self.ads.lock().map_err(lock_poisoned)?;
        Ok(ads.iter().find(|a| a.id == Some(id)).cloned())
    }

    async fn replace(&self, id: ObjectId, mut ad: Advertisement) -> Result<bool, AppError> {
        ad.id = Some(id);

        let mut ads = self.ads.lock().map_err(lock_poisoned)?;
        match ads.iter_mut().find(|a| a.id == Some(id)) {
            Some(existing) => {
                *existing = ad;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        let mut ads = self.ads.lock().map_err(lock_poisoned)?;
        let before = ads.len();
        ads.retain(|a| a.id != Some(id));
        Ok(ads.len() < before)
    }

    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<Advertisement>, AppError> {
        let mut ads = self.ads.lock().map_err(lock_poisoned)?.clone();
        ads.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(page_of(&ads, page, per_page))
    }

    async fn find_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<Option<Advertisement>, AppError> {
        let ads = self.ads.lock().map_err(lock_poisoned)?;
        Ok(ads
            .iter()
            .find(|a| a.content_type == Some(content_type) && a.content_reference == Some(reference))
            .cloned())
    }

    async fn upsert_for_content(&self, ad: Advertisement) -> Result<AdUpsert, AppError> {
        let (Some(content_type), Some(reference)) = (ad.content_type, ad.content_reference) else {
            return Err(AppError::BadRequest(
                "Promoted ads need a content type and reference".into(),
            ));
        };

        let mut ads = self.ads.lock().map_err(lock_poisoned)?;
        let existing = ads.iter_mut().find(|a| {
            a.content_type == Some(content_type) && a.content_reference == Some(reference)
        });

        if let Some(existing) = existing {
            existing.title = ad.title;
            existing.description = ad.description;
            existing.image = ad.image;
            existing.link = ad.link;
            existing.active = true;
            existing.updated_at = Some(BsonDateTime::now());
            return Ok(AdUpsert::Updated);
        }

        ads.push(Advertisement {
            id: Some(ObjectId::new()),
            clicks: 0,
            impressions: 0,
            active: true,
            ..ad
        });
        Ok(AdUpsert::Created)
    }

    async fn delete_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<u64, AppError> {
        let mut ads = self.ads.lock().map_err(lock_poisoned)?;
        let before = ads.len();
        ads.retain(|a| {
            !(a.content_type == Some(content_type) && a.content_reference == Some(reference))
        });
        Ok((before - ads.len()) as u64)
    }

    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.ads.lock().map_err(lock_poisoned)?.len() as u64)
    }

    async fn count_active(&self) -> Result<u64, AppError> {
        let ads = self.ads.lock().map_err(lock_poisoned)?;
        Ok(ads.iter().filter(|a| a.active).count() as u64)
    }

    async fn count_clicks(&self) -> Result<u64, AppError> {
        Ok(self.clicks.lock().map_err(lock_poisoned)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn listing_at(title: &str, minutes_ago: i64) -> Listing {
        let mut listing = Listing::new(title, "", "https://example.com");
        listing.posted_at = BsonDateTime::from_chrono(Utc::now() - Duration::minutes(minutes_ago));
        listing
    }

    fn promoted_ad(reference: ObjectId) -> Advertisement {
        Advertisement {
            id: None,
            title: "Acme".to_string(),
            description: "Backend Intern".to_string(),
            image: String::new(),
            link: "https://acme.example".to_string(),
            active: true,
            clicks: 7,
            impressions: 9,
            content_type: Some(Category::Jobs),
            content_reference: Some(reference),
            posted_at: BsonDateTime::now(),
            updated_at: None,
            admin_id: Some("admin".to_string()),
        }
    }

    #[tokio::test]
    async fn test_pages_are_newest_first() {
        let repo = InMemoryListingRepository::new();
        for (title, age) in [("old", 30), ("new", 1), ("mid", 10)] {
            repo.insert(Category::Courses, listing_at(title, age)).await.unwrap();
        }

        let titles: Vec<String> = repo
            .page(Category::Courses, 1, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid"]);

        let second = repo.page(Category::Courses, 2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].title, "old");
        assert_eq!(repo.count(Category::Courses).await.unwrap(), 3);
        assert_eq!(repo.count(Category::Jobs).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_on_category_fields() {
        let repo = InMemoryListingRepository::new();
        let mut workshop = listing_at("Intro to Robotics", 5);
        workshop.organizer = Some("IEEE Student Branch".to_string());
        repo.insert(Category::Workshops, workshop).await.unwrap();

        assert_eq!(repo.search(Category::Workshops, "ieee", 5).await.unwrap().len(), 1);
        assert_eq!(repo.search(Category::Workshops, "ROBOTICS", 5).await.unwrap().len(), 1);
        // description is not a workshop search field
        assert!(repo.search(Category::Workshops, "nothing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_related_excludes_self_and_matches_job_type() {
        let repo = InMemoryListingRepository::new();
        let mut a = listing_at("A", 3);
        a.job_type = Some("Internship".to_string());
        let mut b = listing_at("B", 2);
        b.job_type = Some("Internship".to_string());
        let mut c = listing_at("C", 1);
        c.job_type = Some("Full-time".to_string());

        let a_id = repo.insert(Category::Jobs, a).await.unwrap();
        repo.insert(Category::Jobs, b).await.unwrap();
        repo.insert(Category::Jobs, c).await.unwrap();

        let related = repo
            .related(Category::Jobs, a_id, Some("Internship".to_string()), 3)
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].title, "B");
    }

    #[tokio::test]
    async fn test_update_and_delete_report_missing_ids() {
        let repo = InMemoryListingRepository::new();
        let missing = ObjectId::new();
        let rename = ListingChanges {
            title: Some("Rust 2".to_string()),
            ..Default::default()
        };

        assert!(!repo.update(Category::Roadmaps, missing, &rename).await.unwrap());
        assert!(!repo.delete(Category::Roadmaps, missing).await.unwrap());

        let id = repo.insert(Category::Roadmaps, listing_at("Rust", 1)).await.unwrap();
        assert!(repo.update(Category::Roadmaps, id, &rename).await.unwrap());
        let stored = repo.find(Category::Roadmaps, id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Rust 2");
        assert_eq!(stored.link, "https://example.com");
        assert!(repo.delete(Category::Roadmaps, id).await.unwrap());
        assert!(repo.find(Category::Roadmaps, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let repo = InMemoryListingRepository::new();
        repo.insert(Category::Jobs, listing_at("only", 1)).await.unwrap();

        assert!(repo.page(Category::Jobs, u64::MAX, 30).await.unwrap().is_empty());
        let (items, total) = repo
            .filter(Category::Jobs, &ListingFilter::default(), u64::MAX, 30)
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = InMemoryUserRepository::new();
        let user = User {
            id: None,
            name: "Asha".to_string(),
            email: "asha@college.edu".to_string(),
            password: "hash".to_string(),
            college: "IIT".to_string(),
            phone: String::new(),
            role: Default::default(),
            created_at: BsonDateTime::now(),
            profile_picture: None,
        };

        repo.insert(user.clone()).await.unwrap();
        assert!(matches!(repo.insert(user).await, Err(AppError::Conflict(_))));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counters_increment_once_per_call() {
        let repo = InMemoryAdRepository::new();
        let id = repo.insert(promoted_ad(ObjectId::new())).await.unwrap();

        assert!(repo.record_impression(id).await.unwrap());
        let click = AdClick {
            id: None,
            ad_id: id,
            clicked_at: BsonDateTime::now(),
            user_id: None,
            ip_address: Some("10.0.0.1".to_string()),
        };
        assert!(repo.record_click(id, click).await.unwrap());

        let ad = repo.find(id).await.unwrap().unwrap();
        assert_eq!(ad.impressions, 10);
        assert_eq!(ad.clicks, 8);
        assert_eq!(repo.count_clicks().await.unwrap(), 1);
        assert!(!repo.record_impression(ObjectId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_for_content_creates_then_updates() {
        let repo = InMemoryAdRepository::new();
        let reference = ObjectId::new();

        assert_eq!(
            repo.upsert_for_content(promoted_ad(reference)).await.unwrap(),
            AdUpsert::Created
        );
        let created = repo.find_by_content(Category::Jobs, reference).await.unwrap().unwrap();
        assert_eq!(created.clicks, 0);
        assert_eq!(created.impressions, 0);

        repo.record_impression(created.id.unwrap()).await.unwrap();

        let mut changed = promoted_ad(reference);
        changed.title = "Acme Corp".to_string();
        assert_eq!(repo.upsert_for_content(changed).await.unwrap(), AdUpsert::Updated);

        let updated = repo.find_by_content(Category::Jobs, reference).await.unwrap().unwrap();
        assert_eq!(updated.title, "Acme Corp");
        assert_eq!(updated.impressions, 1);
        assert_eq!(repo.count().await.unwrap(), 1);

        assert_eq!(repo.delete_by_content(Category::Jobs, reference).await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sample_active_skips_inactive() {
        let repo = InMemoryAdRepository::new();
        let mut inactive = promoted_ad(ObjectId::new());
        inactive.active = false;
        repo.insert(inactive).await.unwrap();
        for _ in 0..7 {
            repo.insert(promoted_ad(ObjectId::new())).await.unwrap();
        }

        let sample = repo.sample_active(5).await.unwrap();
        assert_eq!(sample.len(), 5);
        assert!(sample.iter().all(|a| a.active));
        assert_eq!(repo.count_active().await.unwrap(), 7);
    }
}
