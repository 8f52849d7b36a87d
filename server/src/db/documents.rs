//! Remote document store backed by the `documents` table.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use tedsai_engine::{CollectionName, RemoteDocument, RemoteError, RemoteStore};

/// [`RemoteStore`] over PostgreSQL.
///
/// Reports not ready until [`mark_ready`](Self::mark_ready) is called, which
/// the server does once migrations have run.
pub struct PgRemoteStore {
    pool: PgPool,
    ready: AtomicBool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

fn remote_error(collection: CollectionName, e: sqlx::Error) -> RemoteError {
    RemoteError::new(format!("{collection}: {e}"))
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<RemoteDocument, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let fields = match row.try_get::<Value, _>("fields")? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(RemoteDocument { id, fields })
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_all(&self, collection: CollectionName) -> Result<Vec<RemoteDocument>, RemoteError> {
        let rows = sqlx::query(
            r#"
            SELECT id, fields
            FROM documents
            WHERE collection = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| remote_error(collection, e))?;

        rows.iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| remote_error(collection, e))
    }

    async fn upsert(
        &self,
        collection: CollectionName,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), RemoteError> {
        let query = if merge {
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                fields = documents.fields || EXCLUDED.fields,
                updated_at = now()
            "#
        } else {
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                fields = EXCLUDED.fields,
                updated_at = now()
            "#
        };

        sqlx::query(query)
            .bind(collection.as_str())
            .bind(id)
            .bind(Value::Object(fields))
            .execute(&self.pool)
            .await
            .map_err(|e| remote_error(collection, e))?;

        Ok(())
    }

    async fn add(
        &self,
        collection: CollectionName,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        let id = uuid::Uuid::new_v4().simple().to_string();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await
        .map_err(|e| remote_error(collection, e))?;

        tracing::debug!(collection = %collection, id = %id, "Document created");
        Ok(id)
    }

    async fn delete(&self, collection: CollectionName, id: &str) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| remote_error(collection, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[tokio::test]
    async fn not_ready_until_marked() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let store = PgRemoteStore::new(pool);
        assert!(!store.is_ready());
        store.mark_ready();
        assert!(store.is_ready());
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database in DATABASE_URL"]
    async fn round_trip_against_postgres() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(CollectionName::Logs.as_str())
            .execute(&pool)
            .await
            .unwrap();

        let store = PgRemoteStore::new(pool);
        store.mark_ready();

        let id = store
            .add(CollectionName::Logs, fields(json!({"level": "info", "msg": "a"})))
            .await
            .unwrap();
        store
            .upsert(CollectionName::Logs, &id, fields(json!({"msg": "b"})), true)
            .await
            .unwrap();

        let docs = store.get_all(CollectionName::Logs).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields.get("level"), Some(&json!("info")));
        assert_eq!(docs[0].fields.get("msg"), Some(&json!("b")));

        store
            .upsert(CollectionName::Logs, &id, fields(json!({"msg": "c"})), false)
            .await
            .unwrap();
        let docs = store.get_all(CollectionName::Logs).await.unwrap();
        assert_eq!(docs[0].fields, fields(json!({"msg": "c"})));

        store.delete(CollectionName::Logs, &id).await.unwrap();
        assert!(store.get_all(CollectionName::Logs).await.unwrap().is_empty());
    }
}
