//! Document store abstraction.
//!
//! Supports multiple backends:
//! - `mongo`: MongoDB through the official driver
//! - `memory`: in-process collections, used by tests and local runs
//!
//! Both backends understand the same filter subset: equality (array fields
//! match by membership), dotted paths through embedded arrays, `$regex` with
//! `$options`, `$all`, `$in`, `$ne`, `$exists`, `$gt`/`$gte`/`$lt`/`$lte`,
//! `$or` and `$and`.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use std::fmt;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Named collections. The collection name is the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Categories,
    Tags,
    Titles,
    Products,
    Reviews,
    Suggestions,
    Images,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Users,
        Collection::Categories,
        Collection::Tags,
        Collection::Titles,
        Collection::Products,
        Collection::Reviews,
        Collection::Suggestions,
        Collection::Images,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "Users",
            Collection::Categories => "Categories",
            Collection::Tags => "Tags",
            Collection::Titles => "Titles",
            Collection::Products => "Products",
            Collection::Reviews => "Reviews",
            Collection::Suggestions => "Suggestions",
            Collection::Images => "Images",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store operation errors.
#[derive(Debug)]
pub enum StoreError {
    /// A unique index rejected the write
    Duplicate(String),
    /// A document carried an `_id` that is not an ObjectId
    InvalidId(String),
    /// Driver or connection failure
    Backend(String),
    /// A document could not be converted to or from its typed model
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate(msg) => write!(f, "Duplicate key: {}", msg),
            StoreError::InvalidId(msg) => write!(f, "Invalid id: {}", msg),
            StoreError::Backend(msg) => write!(f, "Store error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<bson::ser::Error> for StoreError {
    fn from(e: bson::ser::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(e: bson::de::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Options for `DocumentStore::find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// `{field: 1 | -1}` in priority order
    pub sort: Option<Document>,
    pub skip: u64,
    /// `None` returns every match
    pub limit: Option<i64>,
    /// Inclusion (`{field: 1}`) or exclusion (`{field: 0}`) projection
    pub projection: Option<Document>,
}

impl FindOptions {
    pub fn page(skip: u64, limit: i64) -> Self {
        Self {
            skip,
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Document),
    /// Join `from` documents whose `foreign_field` equals (any element of)
    /// the local field, stored as an array under `as_field`.
    Lookup {
        from: Collection,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// Emit one document per element of the array at this path. Documents
    /// where the path is missing or empty are dropped.
    Unwind(String),
    /// Store under `field` the number of `values` present in the `array` field.
    CountOverlap {
        field: String,
        array: String,
        values: Vec<Bson>,
    },
    Sort(Document),
    Project(Document),
    Skip(u64),
    Limit(i64),
    /// Replace the stream with `{name: <count>}`, or nothing when empty.
    Count(String),
}

impl Stage {
    pub fn lookup(from: Collection, local_field: &str, foreign_field: &str, as_field: &str) -> Self {
        Stage::Lookup {
            from,
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        }
    }

    /// MongoDB pipeline form of this stage.
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Match(filter) => doc! { "$match": filter.clone() },
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => doc! {
                "$lookup": {
                    "from": from.name(),
                    "localField": local_field.as_str(),
                    "foreignField": foreign_field.as_str(),
                    "as": as_field.as_str(),
                }
            },
            Stage::Unwind(path) => doc! { "$unwind": format!("${}", path) },
            Stage::CountOverlap {
                field,
                array,
                values,
            } => {
                let overlap = doc! {
                    "$size": {
                        "$setIntersection": [
                            { "$ifNull": [format!("${}", array), []] },
                            values.clone(),
                        ]
                    }
                };
                let mut added = Document::new();
                added.insert(field.clone(), overlap);
                doc! { "$addFields": added }
            }
            Stage::Sort(sort) => doc! { "$sort": sort.clone() },
            Stage::Project(projection) => doc! { "$project": projection.clone() },
            Stage::Skip(n) => {
                let skip = *n as i64;
                doc! { "$skip": skip }
            }
            Stage::Limit(n) => {
                let limit = *n;
                doc! { "$limit": limit }
            }
            Stage::Count(name) => doc! { "$count": name.as_str() },
        }
    }
}

/// Trait for document store backends.
///
/// Filters are plain BSON documents in MongoDB query syntax restricted to the
/// subset listed in the module docs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64, StoreError>;

    /// Insert a document, generating `_id` when absent.
    async fn insert(&self, collection: Collection, document: Document)
        -> Result<ObjectId, StoreError>;

    /// Apply `$set` with the given fields and return the updated document.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        set: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError>;

    /// Delete the first document still matching `filter` and return it.
    async fn delete_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn exists(&self, collection: Collection, filter: Document) -> Result<bool, StoreError> {
        Ok(self.find_one(collection, filter).await?.is_some())
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Stage>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Declare a unique index over `fields`. Idempotent.
    async fn ensure_unique_index(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<(), StoreError>;
}

/// Unique indexes that replace check-then-insert duplicate detection.
pub const UNIQUE_INDEXES: &[(Collection, &[&str])] = &[
    (Collection::Users, &["username"]),
    (Collection::Users, &["email"]),
    (Collection::Categories, &["categorySTR"]),
    (Collection::Tags, &["tagSTR"]),
    (Collection::Reviews, &["owner", "product"]),
    (Collection::Suggestions, &["name", "refersto"]),
];

/// Create every unique index the repositories rely on.
pub async fn setup_indexes(store: &dyn DocumentStore) -> Result<(), StoreError> {
    for (collection, fields) in UNIQUE_INDEXES {
        store.ensure_unique_index(*collection, fields).await?;
        log::debug!("Unique index on {}({})", collection, fields.join(", "));
    }
    Ok(())
}

/// Build the backend selected by configuration.
pub async fn connect(
    config: &crate::app_config::DatabaseConfig,
) -> Result<std::sync::Arc<dyn DocumentStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(std::sync::Arc::new(MemoryStore::new())),
        "mongo" => Ok(std::sync::Arc::new(
            MongoStore::connect(&config.uri, &config.name).await?,
        )),
        other => Err(StoreError::Backend(format!(
            "unknown database backend '{}'",
            other
        ))),
    }
}
