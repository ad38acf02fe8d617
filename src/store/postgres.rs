use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, Transaction};
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, StoreTransaction, Subscription};
use crate::error::{ConsoleError, ConsoleResult};

const CHANGE_CHANNEL: &str = "document_changes";

// runs as one implicit transaction; the lock serializes concurrent setups
const SCHEMA: &str = r#"
SELECT pg_advisory_xact_lock(4270531);

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (collection, id)
);

CREATE OR REPLACE FUNCTION notify_document_change() RETURNS trigger AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        PERFORM pg_notify('document_changes', OLD.collection);
    ELSE
        PERFORM pg_notify('document_changes', NEW.collection);
    END IF;
    RETURN NULL;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS documents_changed ON documents;
CREATE TRIGGER documents_changed
    AFTER INSERT OR UPDATE OR DELETE ON documents
    FOR EACH ROW EXECUTE FUNCTION notify_document_change();
"#;

type Row = (String, Json<Fields>);

fn into_document((id, Json(fields)): Row) -> Document {
    Document::new(id, fields)
}

/// Documents kept in a single Postgres table, one `JSONB` value each.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> ConsoleResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        pool.execute(SCHEMA).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> ConsoleResult<Option<Document>> {
        let row: Option<Row> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(into_document))
    }

    async fn list(&self, collection: &str) -> ConsoleResult<Vec<Document>> {
        let rows: Vec<Row> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = $1 ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> ConsoleResult<Vec<Document>> {
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, data FROM documents
             WHERE collection = $1 AND data -> $2 = $3
             ORDER BY id",
        )
        .bind(collection)
        .bind(field)
        .bind(Json(value))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_document).collect())
    }

    async fn add(&self, collection: &str, fields: Fields) -> ConsoleResult<String> {
        let id = Uuid::new_v4().to_simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(fields))
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(ConsoleError::not_found("document", id))
        } else {
            Ok(())
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> ConsoleResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(ConsoleError::not_found("document", id))
        } else {
            Ok(())
        }
    }

    async fn subscribe(&self, collection: &str) -> ConsoleResult<Subscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        let initial = self.list(collection).await?;
        let state = (Some(initial), listener, self.clone(), collection.to_owned());

        let updates = stream::unfold(state, |(pending, mut listener, store, collection)| async move {
            if let Some(documents) = pending {
                return Some((Ok(documents), (None, listener, store, collection)));
            }

            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() != collection => continue,
                    Ok(_) => {
                        let documents = store.list(&collection).await;
                        return Some((documents, (None, listener, store, collection)));
                    }
                    Err(err) => {
                        tracing::error!("Live subscription to {} failed: {}", collection, err);
                        return None;
                    }
                }
            }
        });

        Ok(Subscription::new(Box::pin(updates)))
    }

    async fn begin(&self) -> ConsoleResult<Box<dyn StoreTransaction>> {
        let transaction = self.pool.begin().await?;

        Ok(Box::new(PgTransaction { transaction }))
    }
}

struct PgTransaction {
    transaction: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> ConsoleResult<Option<Document>> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *self.transaction)
        .await?;

        Ok(row.map(into_document))
    }

    async fn set(&mut self, collection: &str, id: &str, fields: Fields) -> ConsoleResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&mut *self.transaction)
        .await?;

        Ok(())
    }

    async fn update_fields(
        &mut self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> ConsoleResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(fields))
        .execute(&mut *self.transaction)
        .await?;

        if result.rows_affected() == 0 {
            Err(ConsoleError::not_found("document", id))
        } else {
            Ok(())
        }
    }

    async fn commit(self: Box<Self>) -> ConsoleResult<()> {
        self.transaction.commit().await?;

        Ok(())
    }
}
