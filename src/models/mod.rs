use async_graphql::Object;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;

use crate::error::{ConsoleError, ConsoleResult};
use crate::store::{Document, Store, StoreTransaction, Timestamp};
use crate::util::format_long_date;

pub mod attendance;
pub mod calendar;
pub mod dashboard;
pub mod event;
pub mod reward;
pub mod session;
pub mod student;
pub mod tags;

/// A typed view over one collection of the store.
#[async_trait]
pub trait Entity: DeserializeOwned + Send + Sync + Sized {
    /// The collection the entity's documents live in.
    const COLLECTION: &'static str;
    /// What to call the entity in error messages.
    const NAME: &'static str;

    fn decode(document: &Document) -> ConsoleResult<Self> {
        document.decode(Self::COLLECTION)
    }

    async fn with_id_opt(id: &str, store: &Store) -> ConsoleResult<Option<Self>> {
        store
            .get(Self::COLLECTION, id)
            .await?
            .map(|document| Self::decode(&document))
            .transpose()
    }

    async fn with_id(id: &str, store: &Store) -> ConsoleResult<Self> {
        Self::with_id_opt(id, store)
            .await?
            .ok_or_else(|| ConsoleError::not_found(Self::NAME, id))
    }

    async fn all(store: &Store) -> ConsoleResult<Vec<Self>> {
        decode_all(store.list(Self::COLLECTION).await?)
    }

    /// Loads the entities with the given ids in order, skipping ids whose
    /// document no longer exists.
    async fn with_ids(ids: &[String], store: &Store) -> ConsoleResult<Vec<Self>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match Self::with_id_opt(id, store).await? {
                Some(entity) => found.push(entity),
                None => tracing::warn!("Skipping missing {} {}", Self::NAME, id),
            }
        }

        Ok(found)
    }

    /// Reads the entity inside a transaction, holding it until the
    /// transaction ends.
    async fn locked(transaction: &mut dyn StoreTransaction, id: &str) -> ConsoleResult<Self> {
        let document = transaction
            .get(Self::COLLECTION, id)
            .await?
            .ok_or_else(|| ConsoleError::not_found(Self::NAME, id))?;

        Self::decode(&document)
    }
}

pub fn decode_all<T: Entity>(documents: Vec<Document>) -> ConsoleResult<Vec<T>> {
    documents.iter().map(T::decode).collect()
}

#[Object]
impl Timestamp {
    /// Seconds since the Unix epoch
    pub async fn seconds(&self) -> i64 {
        self.seconds
    }

    /// The timestamp in RFC 3339 format
    pub async fn iso(&self) -> Option<String> {
        self.to_datetime()
            .ok()
            .and_then(|time| time.format(&Rfc3339).ok())
    }

    /// The date in the host's local time, e.g. "Monday, January 1, 2024"
    pub async fn display(&self) -> String {
        self.to_datetime()
            .map(format_long_date)
            .unwrap_or_default()
    }
}
