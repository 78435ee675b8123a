use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::api::pagination::skip_for;
use crate::db::models::{Category, Listing, ListingChanges, ListingFilter};
use crate::error::AppError;

/// Repository trait for listing operations across every content category.
///
/// This trait allows swapping the database layer in tests and demo mode.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// One page of a category, newest first.
    async fn page(
        &self,
        category: Category,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<Listing>, AppError>;

    async fn count(&self, category: Category) -> Result<u64, AppError>;

    async fn find(&self, category: Category, id: ObjectId) -> Result<Option<Listing>, AppError>;

    /// Store a new listing and return its id.
    async fn insert(&self, category: Category, listing: Listing) -> Result<ObjectId, AppError>;

    /// Apply `changes` to the listing with `id`, leaving other stored fields alone.
    /// Returns `false` when nothing matched.
    async fn update(
        &self,
        category: Category,
        id: ObjectId,
        changes: &ListingChanges,
    ) -> Result<bool, AppError>;

    /// Delete the listing with `id`. Returns `false` when nothing was deleted.
    async fn delete(&self, category: Category, id: ObjectId) -> Result<bool, AppError>;

    /// Newest listings of the same category other than `exclude`.
    ///
    /// When `job_type` is given only listings with that job type qualify.
    async fn related(
        &self,
        category: Category,
        exclude: ObjectId,
        job_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError>;

    /// Websites flagged as community projects, newest first.
    async fn projects(&self) -> Result<Vec<Listing>, AppError>;

    /// Text search within one category, best matches first.
    async fn search(
        &self,
        category: Category,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError>;

    /// One page of listings matching `filter`, plus the total number of matches.
    async fn filter(
        &self,
        category: Category,
        filter: &ListingFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Listing>, u64), AppError>;
}

/// Drain a cursor into a vector.
pub(crate) async fn collect_cursor<T>(cursor: mongodb::Cursor<T>) -> Result<Vec<T>, AppError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    use futures::TryStreamExt;

    cursor.try_collect().await.map_err(AppError::from)
}

/// MongoDB implementation of the ListingRepository.
///
/// Each category is stored in its own collection (see [`Category::collection_name`]).
pub struct MongoListingRepository {
    db: mongodb::Database,
}

impl MongoListingRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, category: Category) -> mongodb::Collection<Listing> {
        self.db.collection(category.collection_name())
    }

    /// Create the indexes listing queries rely on.
    ///
    /// Safe to run on every startup: existing identical indexes are left alone.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        for category in Category::ALL {
            self.collection(category)
                .create_index(IndexModel::builder().keys(doc! { "posted_at": -1 }).build())
                .await?;
        }

        let jobs = self.collection(Category::Jobs);
        for keys in [
            doc! { "job_type": 1, "posted_at": -1 },
            doc! { "location": 1, "posted_at": -1 },
        ] {
            jobs.create_index(IndexModel::builder().keys(keys).build()).await?;
        }

        let text_indexes = [
            (
                Category::Jobs,
                doc! { "title": "text", "role": "text", "description": "text" },
            ),
            (Category::Workshops, doc! { "title": "text", "organizer": "text" }),
            (Category::Hackathons, doc! { "title": "text", "organizer": "text" }),
            (Category::Courses, doc! { "title": "text", "instructor": "text" }),
        ];
        for (category, keys) in text_indexes {
            self.collection(category)
                .create_index(IndexModel::builder().keys(keys).build())
                .await?;
        }

        tracing::info!("listing indexes ensured");
        Ok(())
    }

    async fn find_sorted(
        &self,
        category: Category,
        filter: mongodb::bson::Document,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "posted_at": -1 })
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self.collection(category).find(filter).with_options(options).await?;

        collect_cursor(cursor).await
    }

    async fn text_search(
        &self,
        category: Category,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Listing>, mongodb::error::Error> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .projection(doc! { "score": { "$meta": "textScore" } })
            .sort(doc! { "score": { "$meta": "textScore" } })
            .limit(limit)
            .build();

        self.collection(category)
            .find(doc! { "$text": { "$search": query } })
            .with_options(options)
            .await?
            .try_collect()
            .await
    }
}

/// Case-insensitive regex match on any of `fields`, with `query` matched literally.
pub(crate) fn regex_any_field(fields: &[&str], query: &str) -> mongodb::bson::Document {
    use mongodb::bson::{doc, Document};

    let pattern = regex::escape(query);
    let clauses: Vec<Document> = fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": pattern.as_str(), "$options": "i" });
            clause
        })
        .collect();

    doc! { "$or": clauses }
}

/// Translate a [`ListingFilter`] into a MongoDB query document.
pub(crate) fn filter_document(filter: &ListingFilter) -> mongodb::bson::Document {
    use mongodb::bson::{doc, DateTime as BsonDateTime};

    let mut query = doc! {};
    if let Some(location) = &filter.location {
        query.insert(
            "location",
            doc! { "$regex": regex::escape(location), "$options": "i" },
        );
    }
    if let Some(price) = &filter.price {
        query.insert("price", price.as_str());
    }
    if let Some(since) = filter.posted_since {
        query.insert("posted_at", doc! { "$gte": BsonDateTime::from_chrono(since) });
    }
    if let Some(job_type) = &filter.job_type {
        query.insert("job_type", job_type.as_str());
    }
    if let Some(experience) = &filter.required_experience {
        query.insert("required_experience", experience.as_str());
    }
    query
}

#[async_trait]
impl ListingRepository for MongoListingRepository {
    async fn page(
        &self,
        category: Category,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<Listing>, AppError> {
        use mongodb::bson::doc;

        self.find_sorted(category, doc! {}, skip_for(page, per_page), per_page as i64)
            .await
    }

    async fn count(&self, category: Category) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.collection(category).count_documents(doc! {}).await.map_err(AppError::from)
    }

    async fn find(&self, category: Category, id: ObjectId) -> Result<Option<Listing>, AppError> {
        use mongodb::bson::doc;

        self.collection(category)
            .find_one(doc! { "_id": id })
            .await
            .map_err(AppError::from)
    }

    async fn insert(&self, category: Category, listing: Listing) -> Result<ObjectId, AppError> {
        let result = self.collection(category).insert_one(&listing).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Internal("Inserted listing has no ObjectId".into()))
    }

    async fn update(
        &self,
        category: Category,
        id: ObjectId,
        changes: &ListingChanges,
    ) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection(category)
            .update_one(doc! { "_id": id }, changes.to_update_document())
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn delete(&self, category: Category, id: ObjectId) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self.collection(category).delete_one(doc! { "_id": id }).await?;

        Ok(result.deleted_count > 0)
    }

    async fn related(
        &self,
        category: Category,
        exclude: ObjectId,
        job_type: Option<String>,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError> {
        use mongodb::bson::doc;

        let mut filter = doc! { "_id": { "$ne": exclude } };
        if let Some(job_type) = job_type {
            filter.insert("job_type", job_type);
        }

        self.find_sorted(category, filter, 0, limit).await
    }

    async fn projects(&self) -> Result<Vec<Listing>, AppError> {
        use mongodb::bson::doc;

        self.find_sorted(Category::Websites, doc! { "is_project": true }, 0, 0)
            .await
    }

    async fn search(
        &self,
        category: Category,
        query: &str,
        limit: i64,
    ) -> Result<Vec<Listing>, AppError> {
        match self.text_search(category, query, limit).await {
            Ok(hits) => Ok(hits),
            Err(e) => {
                // No text index (or an unparsable query): fall back to a regex scan.
                tracing::debug!(category = %category, error = %e, "text search failed, using regex");
                let filter = regex_any_field(category.search_fields(), query);
                self.find_sorted(category, filter, 0, limit).await
            }
        }
    }

    async fn filter(
        &self,
        category: Category,
        filter: &ListingFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Listing>, u64), AppError> {
        let query = filter_document(filter);

        let total = self.collection(category).count_documents(query.clone()).await?;

        let items = self
            .find_sorted(category, query, skip_for(page, per_page), per_page as i64)
            .await?;

        Ok((items, total))
    }
}
