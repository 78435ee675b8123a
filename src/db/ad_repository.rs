use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::db::models::{AdClick, AdUpsert, Advertisement, Category};
use crate::api::pagination::skip_for;
use crate::error::AppError;

/// Repository trait for advertisements and their click log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdRepository: Send + Sync {
    /// Up to `size` active ads in random order.
    async fn sample_active(&self, size: u64) -> Result<Vec<Advertisement>, AppError>;

    /// Increment the impression counter. Returns `false` if the ad does not exist.
    async fn record_impression(&self, id: ObjectId) -> Result<bool, AppError>;

    /// Increment the click counter and log `click`. Returns `false` if the ad does not exist.
    async fn record_click(&self, id: ObjectId, click: AdClick) -> Result<bool, AppError>;

    async fn insert(&self, ad: Advertisement) -> Result<ObjectId, AppError>;

    async fn find(&self, id: ObjectId) -> Result<Option<Advertisement>, AppError>;

    async fn replace(&self, id: ObjectId, ad: Advertisement) -> Result<bool, AppError>;

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError>;

    /// One page of ads, newest first.
    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<Advertisement>, AppError>;

    /// The ad promoting a given listing, if any.
    async fn find_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<Option<Advertisement>, AppError>;

    /// Refresh the ad that promotes `ad.content_reference`, or create it.
    ///
    /// Updates keep the existing counters; created ads start at zero.
    async fn upsert_for_content(&self, ad: Advertisement) -> Result<AdUpsert, AppError>;

    /// Delete every ad promoting a listing. Returns how many were removed.
    async fn delete_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<u64, AppError>;

    async fn count(&self) -> Result<u64, AppError>;

    async fn count_active(&self) -> Result<u64, AppError>;

    /// Number of logged clicks across all ads.
    async fn count_clicks(&self) -> Result<u64, AppError>;
}

/// MongoDB implementation of the AdRepository.
pub struct MongoAdRepository {
    collection: mongodb::Collection<Advertisement>,
    clicks: mongodb::Collection<AdClick>,
}

impl MongoAdRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("advertisements"),
            clicks: db.collection("ad_clicks"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "active": 1, "clicks": -1 })
                    .build(),
            )
            .await?;

        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "content_type": 1, "content_reference": 1 })
                    .build(),
            )
            .await?;

        Ok(())
    }

    async fn increment(&self, id: ObjectId, counter: &str) -> Result<bool, AppError> {
        use mongodb::bson::{doc, Document};

        let mut inc = Document::new();
        inc.insert(counter, 1_i64);

        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$inc": inc })
            .await?;

        Ok(result.matched_count > 0)
    }
}

fn content_filter(content_type: Category, reference: ObjectId) -> mongodb::bson::Document {
    mongodb::bson::doc! {
        "content_type": content_type.slug(),
        "content_reference": reference,
    }
}

#[async_trait]
impl AdRepository for MongoAdRepository {
    async fn sample_active(&self, size: u64) -> Result<Vec<Advertisement>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let pipeline = vec![
            doc! { "$match": { "active": true } },
            doc! { "$sample": { "size": size as i64 } },
        ];

        let mut cursor = self.collection.aggregate(pipeline).await?;

        let mut ads = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            let ad: Advertisement = mongodb::bson::from_document(raw)
                .map_err(|e| AppError::Database(format!("unreadable ad: {e}")))?;
            ads.push(ad);
        }

        Ok(ads)
    }

    async fn record_impression(&self, id: ObjectId) -> Result<bool, AppError> {
        self.increment(id, "impressions").await
    }

    async fn record_click(&self, id: ObjectId, click: AdClick) -> Result<bool, AppError> {
        if !self.increment(id, "clicks").await? {
            return Ok(false);
        }

        self.clicks.insert_one(&click).await?;

        Ok(true)
    }

    async fn insert(&self, ad: Advertisement) -> Result<ObjectId, AppError> {
        let result = self.collection.insert_one(&ad).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Internal("Inserted ad has no ObjectId".into()))
    }

    async fn find(&self, id: ObjectId) -> Result<Option<Advertisement>, AppError> {
        use mongodb::bson::doc;

        self.collection.find_one(doc! { "_id": id }).await.map_err(AppError::from)
    }

    async fn replace(&self, id: ObjectId, mut ad: Advertisement) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        ad.id = Some(id);
        let result = self.collection.replace_one(doc! { "_id": id }, &ad).await?;

        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self.collection.delete_one(doc! { "_id": id }).await?;

        Ok(result.deleted_count > 0)
    }

    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<Advertisement>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "posted_at": -1 })
            .skip(skip_for(page, per_page))
            .limit(per_page as i64)
            .build();

        let cursor = self.collection.find(doc! {}).with_options(options).await?;

        crate::db::repository::collect_cursor(cursor).await
    }

    async fn find_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<Option<Advertisement>, AppError> {
        self.collection
            .find_one(content_filter(content_type, reference))
            .await
            .map_err(AppError::from)
    }

    async fn upsert_for_content(&self, ad: Advertisement) -> Result<AdUpsert, AppError> {
        use mongodb::bson::{doc, DateTime as BsonDateTime};

        let (Some(content_type), Some(reference)) = (ad.content_type, ad.content_reference) else {
            return Err(AppError::BadRequest(
                "Promoted ads need a content type and reference".into(),
            ));
        };

        let result = self
            .collection
            .update_one(
                content_filter(content_type, reference),
                doc! {
                    "$set": {
                        "title": ad.title.as_str(),
                        "description": ad.description.as_str(),
                        "image": ad.image.as_str(),
                        "link": ad.link.as_str(),
                        "active": true,
                        "updated_at": BsonDateTime::now(),
                    }
                },
            )
            .await?;

        if result.matched_count > 0 {
            return Ok(AdUpsert::Updated);
        }

        let fresh = Advertisement {
            id: None,
            clicks: 0,
            impressions: 0,
            active: true,
            ..ad
        };
        self.insert(fresh).await?;
        Ok(AdUpsert::Created)
    }

    async fn delete_by_content(
        &self,
        content_type: Category,
        reference: ObjectId,
    ) -> Result<u64, AppError> {
        let result = self
            .collection
            .delete_many(content_filter(content_type, reference))
            .await?;

        Ok(result.deleted_count)
    }

    async fn count(&self) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.collection.count_documents(doc! {}).await.map_err(AppError::from)
    }

    async fn count_active(&self) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.collection
            .count_documents(doc! { "active": true })
            .await
            .map_err(AppError::from)
    }

    async fn count_clicks(&self) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.clicks.count_documents(doc! {}).await.map_err(AppError::from)
    }
}
