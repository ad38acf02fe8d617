use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{merge, Document, DocumentStore, Fields, StoreTransaction, Subscription};
use crate::error::{ConsoleError, ConsoleResult};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

const CHANGE_BUFFER: usize = 64;

/// Reference implementation, kept entirely in memory.
///
/// Transactions take the store lock for their whole lifetime, so they are
/// serialized against each other and against plain writes.
#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
    changes: broadcast::Sender<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);

        Self {
            collections: Arc::default(),
            changes,
        }
    }
}

impl MemoryStore {
    fn notify(&self, collection: &str) {
        // no receivers just means nobody is subscribed
        let _ = self.changes.send(collection.to_owned());
    }

    fn documents(collections: &Collections, collection: &str) -> Vec<Document> {
        collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> ConsoleResult<Option<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn list(&self, collection: &str) -> ConsoleResult<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(Self::documents(&collections, collection))
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> ConsoleResult<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(Self::documents(&collections, collection)
            .into_iter()
            .filter(|document| document.fields.get(field) == Some(value))
            .collect())
    }

    async fn add(&self, collection: &str, fields: Fields) -> ConsoleResult<String> {
        let id = Uuid::new_v4().to_simple().to_string();
        self.collections
            .lock()
            .await
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), fields);
        self.notify(collection);

        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        self.collections
            .lock()
            .await
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), fields);
        self.notify(collection);

        Ok(())
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        {
            let mut collections = self.collections.lock().await;
            let existing = collections
                .get_mut(collection)
                .and_then(|documents| documents.get_mut(id))
                .ok_or_else(|| ConsoleError::not_found("document", id))?;
            merge(existing, fields);
        }
        self.notify(collection);

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> ConsoleResult<()> {
        self.collections
            .lock()
            .await
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .ok_or_else(|| ConsoleError::not_found("document", id))?;
        self.notify(collection);

        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> ConsoleResult<Subscription> {
        // subscribe before the first snapshot so no change slips between them
        let receiver = self.changes.subscribe();
        let initial = self.list(collection).await?;
        let state = (Some(initial), receiver, self.clone(), collection.to_owned());

        let updates = stream::unfold(state, |(pending, mut receiver, store, collection)| async move {
            if let Some(documents) = pending {
                return Some((Ok(documents), (None, receiver, store, collection)));
            }

            loop {
                match receiver.recv().await {
                    Ok(changed) if changed != collection => continue,
                    // a lagged receiver missed changes, so resend the whole collection
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        let documents = store.list(&collection).await;
                        return Some((documents, (None, receiver, store, collection)));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(Subscription::new(Box::pin(updates)))
    }

    async fn begin(&self) -> ConsoleResult<Box<dyn StoreTransaction>> {
        let guard = self.collections.clone().lock_owned().await;

        Ok(Box::new(MemoryTransaction {
            guard,
            staged: HashMap::new(),
            changes: self.changes.clone(),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Collections>,
    staged: HashMap<(String, String), Fields>,
    changes: broadcast::Sender<String>,
}

impl MemoryTransaction {
    fn current(&self, collection: &str, id: &str) -> Option<Fields> {
        self.staged
            .get(&(collection.to_owned(), id.to_owned()))
            .cloned()
            .or_else(|| {
                self.guard
                    .get(collection)
                    .and_then(|documents| documents.get(id))
                    .cloned()
            })
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> ConsoleResult<Option<Document>> {
        Ok(self
            .current(collection, id)
            .map(|fields| Document::new(id, fields)))
    }

    async fn set(&mut self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        self.staged
            .insert((collection.to_owned(), id.to_owned()), fields);

        Ok(())
    }

    async fn update_fields(
        &mut self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> ConsoleResult<()> {
        let mut current = self
            .current(collection, id)
            .ok_or_else(|| ConsoleError::not_found("document", id))?;
        merge(&mut current, fields);
        self.staged
            .insert((collection.to_owned(), id.to_owned()), current);

        Ok(())
    }

    async fn commit(self: Box<Self>) -> ConsoleResult<()> {
        let MemoryTransaction {
            mut guard,
            staged,
            changes,
        } = *self;

        let mut touched = HashSet::new();
        for ((collection, id), fields) in staged {
            guard
                .entry(collection.clone())
                .or_default()
                .insert(id, fields);
            touched.insert(collection);
        }
        drop(guard);

        for collection in touched {
            let _ = changes.send(collection);
        }

        Ok(())
    }
}
