//! MongoDB document store.

use super::{Collection, DocumentStore, FindOptions, Stage, StoreError};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument,
};
use mongodb::{Client, Database, IndexModel};

const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        let duplicate = match e.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
            ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
            _ => false,
        };
        if duplicate {
            StoreError::Duplicate(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, name: &str) -> Result<Self, StoreError> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;
        let database = client.database(name);
        database.run_command(doc! { "ping": 1 }, None).await?;
        log::info!("Connected to MongoDB database '{}'", name);
        Ok(Self { database })
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection(collection.name())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.collection(collection).find_one(filter, None).await?)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let options = mongodb::options::FindOptions::builder()
            .sort(options.sort)
            .skip(Some(options.skip))
            .limit(options.limit)
            .projection(options.projection)
            .build();
        let cursor = self.collection(collection).find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: Collection, filter: Document) -> Result<u64, StoreError> {
        Ok(self
            .collection(collection)
            .count_documents(filter, None)
            .await?)
    }

    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<ObjectId, StoreError> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document
            .get_object_id("_id")
            .map_err(|e| StoreError::InvalidId(e.to_string()))?;
        self.collection(collection)
            .insert_one(document, None)
            .await?;
        Ok(id)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
        set: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collection(collection)
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": set },
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?)
    }

    async fn delete_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.delete_one(collection, doc! { "_id": id }).await
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collection(collection)
            .find_one_and_delete(filter, None)
            .await?)
    }

    async fn exists(&self, collection: Collection, filter: Document) -> Result<bool, StoreError> {
        let options = mongodb::options::FindOneOptions::builder()
            .projection(doc! { "_id": 1 })
            .build();
        Ok(self
            .collection(collection)
            .find_one(filter, options)
            .await?
            .is_some())
    }

    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Stage>,
    ) -> Result<Vec<Document>, StoreError> {
        let pipeline: Vec<Document> = pipeline.iter().map(Stage::to_document).collect();
        let cursor = self
            .collection(collection)
            .aggregate(pipeline, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn ensure_unique_index(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<(), StoreError> {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(field.to_string(), 1);
        }
        self.collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(keys)
                    .options(Some(IndexOptions::builder().unique(true).build()))
                    .build(),
                None,
            )
            .await?;
        Ok(())
    }
}
