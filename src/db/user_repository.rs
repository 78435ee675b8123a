use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::db::models::User;
use crate::api::pagination::skip_for;
use crate::error::AppError;

/// Repository trait for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by (already lowercased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError>;

    /// Store a new user. Fails with [`AppError::Conflict`] when the email is taken.
    async fn insert(&self, user: User) -> Result<ObjectId, AppError>;

    /// One page of users, newest first.
    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<User>, AppError>;

    async fn count(&self) -> Result<u64, AppError>;
}

/// Whether a MongoDB error is a unique index violation.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    /// Create the unique email index.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;

        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;

        self.collection.find_one(doc! { "email": email }).await.map_err(AppError::from)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;

        self.collection.find_one(doc! { "_id": id }).await.map_err(AppError::from)
    }

    async fn insert(&self, user: User) -> Result<ObjectId, AppError> {
        let result = self.collection.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("Email already registered".into())
            } else {
                AppError::from(e)
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Internal("Inserted user has no ObjectId".into()))
    }

    async fn page(&self, page: u64, per_page: u64) -> Result<Vec<User>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(skip_for(page, per_page))
            .limit(per_page as i64)
            .build();

        let cursor = self.collection.find(doc! {}).with_options(options).await?;

        crate::db::repository::collect_cursor(cursor).await
    }

    async fn count(&self) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        self.collection.count_documents(doc! {}).await.map_err(AppError::from)
    }
}
