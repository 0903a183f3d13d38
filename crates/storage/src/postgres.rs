//! Postgres-backed [`AuthorityStore`]: `pg_trgm` for the trigram channel,
//! `pgvector` for the semantic channel, in the same relational store
//! (spec §3, §4.3, §4.4).

use crate::error::StorageError;
use crate::{AuthorityStore, SearchHit};
use async_trait::async_trait;
use pgvector::Vector;
use reconcile_core::config::StorageConfig;
use reconcile_core::entities::{AuthorityRow, EntityTypeDescriptor, PropertyValue};
use reconcile_core::error::{Error, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

pub struct PostgresAuthorityStore {
    pool: PgPool,
}

impl PostgresAuthorityStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let connect_options = PgConnectOptions::new()
            .host(&config.postgres_host)
            .port(config.postgres_port)
            .username(&config.postgres_user)
            .password(&config.postgres_password)
            .database(&config.postgres_database);

        info!(
            host = %config.postgres_host,
            port = config.postgres_port,
            database = %config.postgres_database,
            "connecting to authority database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.postgres_pool_size)
            .acquire_timeout(Duration::from_millis(config.connection_wait_timeout_ms))
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the extension-only migration set (spec §3: the authority
    /// tables themselves are out of scope for this service to own).
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationError(e.to_string()))?;
        Ok(())
    }

    fn embeddings_table(table: &str) -> String {
        format!("{table}_embeddings")
    }
}

#[async_trait]
impl AuthorityStore for PostgresAuthorityStore {
    async fn trigram_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        norm_query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let sql = format!(
            "SELECT {id_col} AS id, {label_col} AS label, similarity(norm_label, $1) AS score \
             FROM {table} WHERE norm_label % $1 ORDER BY score DESC LIMIT $2",
            id_col = entity_type.id_column,
            label_col = entity_type.label_column,
            table = entity_type.table,
        );

        let rows = sqlx::query(&sql)
            .bind(norm_query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(SearchHit {
                    id: row.try_get("id").map_err(|e| StorageError::BackendError(e.to_string()))?,
                    label: row.try_get("label").map_err(|e| StorageError::BackendError(e.to_string()))?,
                    score: row.try_get::<f32, _>("score").map_err(|e| StorageError::BackendError(e.to_string()))? as f64,
                })
            })
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .map_err(Error::from)
    }

    async fn semantic_search(
        &self,
        entity_type: &EntityTypeDescriptor,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let embeddings_table = Self::embeddings_table(&entity_type.table);
        let sql = format!(
            "SELECT e.id AS id, a.{label_col} AS label, \
             GREATEST(0, LEAST(1, 1 - (e.embedding <=> $1))) AS score \
             FROM {embeddings_table} e JOIN {table} a ON a.{id_col} = e.id \
             ORDER BY e.embedding <=> $1 LIMIT $2",
            label_col = entity_type.label_column,
            id_col = entity_type.id_column,
            table = entity_type.table,
        );

        let vector = Vector::from(query_vector.to_vec());
        let rows = sqlx::query(&sql)
            .bind(vector)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(SearchHit {
                    id: row.try_get("id").map_err(|e| StorageError::BackendError(e.to_string()))?,
                    label: row.try_get("label").map_err(|e| StorageError::BackendError(e.to_string()))?,
                    score: row.try_get::<f32, _>("score").map_err(|e| StorageError::BackendError(e.to_string()))? as f64,
                })
            })
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .map_err(Error::from)
    }

    async fn get_row(&self, entity_type: &EntityTypeDescriptor, id: i64) -> Result<Option<AuthorityRow>> {
        let rows = self.get_rows(entity_type, &[id]).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_rows(&self, entity_type: &EntityTypeDescriptor, ids: &[i64]) -> Result<Vec<AuthorityRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let secondary_columns = entity_type.secondary_fields.join(", ");
        let secondary_select = if secondary_columns.is_empty() {
            String::new()
        } else {
            format!(", {secondary_columns}")
        };

        let sql = format!(
            "SELECT {id_col} AS id, {label_col} AS label, norm_label{secondary_select} \
             FROM {table} WHERE {id_col} = ANY($1)",
            id_col = entity_type.id_column,
            label_col = entity_type.label_column,
            table = entity_type.table,
        );

        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(|e| StorageError::BackendError(e.to_string()))?;
            let label: String = row.try_get("label").map_err(|e| StorageError::BackendError(e.to_string()))?;
            let norm_label: String = row.try_get("norm_label").map_err(|e| StorageError::BackendError(e.to_string()))?;

            let mut secondary_fields = BTreeMap::new();
            for field in &entity_type.secondary_fields {
                if let Ok(value) = row.try_get::<String, _>(field.as_str()) {
                    secondary_fields.insert(field.clone(), PropertyValue::String(value));
                } else if let Ok(value) = row.try_get::<f64, _>(field.as_str()) {
                    secondary_fields.insert(field.clone(), PropertyValue::Number(value));
                }
            }

            out.push(AuthorityRow {
                id,
                label,
                norm_label,
                secondary_fields,
            });
        }
        Ok(out)
    }

    async fn list_property_values(
        &self,
        entity_type: &EntityTypeDescriptor,
        property_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<PropertyValue>> {
        if !entity_type.secondary_fields.iter().any(|f| f == property_id)
            && !entity_type.properties.iter().any(|p| p.id == property_id)
        {
            return Err(StorageError::UnknownEntityType(format!(
                "{} has no property '{property_id}'",
                entity_type.name
            ))
            .into());
        }

        let sql = format!(
            "SELECT DISTINCT {property_id}::text AS value FROM {table} \
             WHERE {property_id}::text ILIKE $1 ORDER BY value LIMIT $2",
            table = entity_type.table,
        );

        let pattern = format!("{prefix}%");
        let rows = sqlx::query(&sql)
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let value: String = row.try_get("value").map_err(|e| StorageError::BackendError(e.to_string()))?;
                Ok(PropertyValue::String(value))
            })
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .map_err(Error::from)
    }

    async fn fetch_by_label(&self, entity_type: &EntityTypeDescriptor, label: &str) -> Result<Option<AuthorityRow>> {
        let secondary_columns = entity_type.secondary_fields.join(", ");
        let secondary_select = if secondary_columns.is_empty() {
            String::new()
        } else {
            format!(", {secondary_columns}")
        };

        let sql = format!(
            "SELECT {id_col} AS id, {label_col} AS label, norm_label{secondary_select} \
             FROM {table} WHERE LOWER({label_col}) = LOWER($1) LIMIT 1",
            id_col = entity_type.id_column,
            label_col = entity_type.label_column,
            table = entity_type.table,
        );

        let row = sqlx::query(&sql)
            .bind(label)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id").map_err(|e| StorageError::BackendError(e.to_string()))?;
        let row_label: String = row.try_get("label").map_err(|e| StorageError::BackendError(e.to_string()))?;
        let norm_label: String = row.try_get("norm_label").map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut secondary_fields = BTreeMap::new();
        for field in &entity_type.secondary_fields {
            if let Ok(value) = row.try_get::<String, _>(field.as_str()) {
                secondary_fields.insert(field.clone(), PropertyValue::String(value));
            } else if let Ok(value) = row.try_get::<f64, _>(field.as_str()) {
                secondary_fields.insert(field.clone(), PropertyValue::Number(value));
            }
        }

        Ok(Some(AuthorityRow { id, label: row_label, norm_label, secondary_fields }))
    }
}
