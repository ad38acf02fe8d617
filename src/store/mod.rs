//! The document store the console is built on.
//!
//! Collections hold schemaless JSON documents addressed by id. The
//! [`DocumentStore`] trait is the whole contract; [`MemoryStore`] is the
//! reference implementation used in development and tests, and
//! [`PgStore`] keeps documents in a Postgres `JSONB` table.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{ConsoleError, ConsoleResult};

mod memory;
mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

/// The fields of a document, without its id.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Reads the document as a typed entity. The document id is made
    /// available to the entity as its `id` field.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> ConsoleResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_owned(), Value::String(self.id.clone()));

        serde_json::from_value(Value::Object(fields)).map_err(|source| {
            ConsoleError::MalformedDocument {
                collection: collection.to_owned(),
                id: self.id.clone(),
                source,
            }
        })
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }
}

/// Serializes a value into document fields. Anything that doesn't
/// serialize to a JSON object is an encoding error.
pub fn encode<T: Serialize>(value: &T) -> ConsoleResult<Fields> {
    match serde_json::to_value(value).map_err(ConsoleError::Encoding)? {
        Value::Object(fields) => Ok(fields),
        other => Err(ConsoleError::Encoding(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        )))),
    }
}

/// A store-native timestamp, kept as epoch seconds plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanoseconds: i32,
}

impl Timestamp {
    pub fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds: 0,
        }
    }

    pub fn now() -> Self {
        Self::from(OffsetDateTime::now_utc())
    }

    pub fn to_datetime(self) -> ConsoleResult<OffsetDateTime> {
        let nanos = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanoseconds);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| ConsoleError::InvalidTimestamp(format!("{:?}: {}", self, err)))
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(time: OffsetDateTime) -> Self {
        Self {
            seconds: time.unix_timestamp(),
            nanoseconds: time.nanosecond() as i32,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds)
    }
}

/// A live view of one collection: yields every document in it right away,
/// then again each time the collection changes.
pub struct Subscription {
    stream: BoxStream<'static, ConsoleResult<Vec<Document>>>,
}

impl Subscription {
    pub fn new(stream: BoxStream<'static, ConsoleResult<Vec<Document>>>) -> Self {
        Self { stream }
    }

    pub async fn next(&mut self) -> Option<ConsoleResult<Vec<Document>>> {
        self.stream.next().await
    }

    pub fn into_stream(self) -> BoxStream<'static, ConsoleResult<Vec<Document>>> {
        self.stream
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> ConsoleResult<Option<Document>>;

    /// Every document in the collection, ordered by id.
    async fn list(&self, collection: &str) -> ConsoleResult<Vec<Document>>;

    /// Every document whose `field` equals `value`.
    async fn query(&self, collection: &str, field: &str, value: &Value)
        -> ConsoleResult<Vec<Document>>;

    /// Adds a document under a freshly generated id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> ConsoleResult<String>;

    /// Creates or replaces the document with the given id.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()>;

    /// Shallowly merges `fields` into an existing document.
    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> ConsoleResult<()>;

    async fn subscribe(&self, collection: &str) -> ConsoleResult<Subscription>;

    /// Starts a transaction. Nothing written through it is visible until
    /// [`StoreTransaction::commit`]; dropping it discards the writes.
    async fn begin(&self) -> ConsoleResult<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Reads a document and holds it against concurrent writers until the
    /// transaction ends.
    async fn get(&mut self, collection: &str, id: &str) -> ConsoleResult<Option<Document>>;

    async fn set(&mut self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()>;

    async fn update_fields(
        &mut self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> ConsoleResult<()>;

    async fn commit(self: Box<Self>) -> ConsoleResult<()>;
}

/// A shared handle to whichever store the console is running against.
#[derive(Clone)]
pub struct Store(Arc<dyn DocumentStore>);

impl Store {
    pub fn new(store: impl DocumentStore + 'static) -> Self {
        Self(Arc::new(store))
    }

    pub fn memory() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl Deref for Store {
    type Target = dyn DocumentStore;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

pub(crate) fn merge(target: &mut Fields, fields: Fields) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[derive(Deserialize)]
    struct Named {
        id: String,
        name: String,
    }

    #[test]
    fn decode_exposes_the_document_id() {
        let fields = encode(&json!({ "name": "Career Fair" })).unwrap();
        let named: Named = Document::new("e1", fields).decode("events").unwrap();

        assert_eq!(named.id, "e1");
        assert_eq!(named.name, "Career Fair");
    }

    #[test]
    fn decode_reports_the_offending_document() {
        let fields = encode(&json!({ "name": 7 })).unwrap();
        let error = Document::new("e2", fields)
            .decode::<Named>("events")
            .err()
            .unwrap();

        assert!(matches!(
            error,
            ConsoleError::MalformedDocument { ref collection, ref id, .. }
                if collection == "events" && id == "e2"
        ));
    }

    #[test]
    fn encode_rejects_non_objects() {
        assert!(encode(&3).is_err());
    }

    #[test]
    fn timestamps_keep_epoch_seconds() {
        let time = datetime!(2025-04-30 10:00 UTC);
        let timestamp = Timestamp::from(time);

        assert_eq!(timestamp.seconds, time.unix_timestamp());
        assert_eq!(timestamp.to_datetime().unwrap(), time);
        assert_eq!(
            serde_json::to_value(timestamp).unwrap(),
            json!({ "seconds": time.unix_timestamp(), "nanoseconds": 0 })
        );
    }
}
