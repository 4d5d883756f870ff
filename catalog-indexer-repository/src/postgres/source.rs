//! PostgreSQL implementation of the relational source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::errors::SourceError;
use crate::interfaces::SourceRepository;
use crate::postgres::queries;
use catalog_indexer_shared::{
    AggregatedRow, CategoryRow, ChangedId, EntityKind, PersonRow, Watermark, WorkRow,
};

/// Relational source backed by a PostgreSQL connection pool.
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    /// Connect to the database at `url`.
    ///
    /// The pool connects lazily, so an unreachable database surfaces on the
    /// first query and is retried by the pipeline like any other transient
    /// failure.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|e| SourceError::connection(e.to_string()))?;

        info!(max_connections = max_connections, "Created PostgreSQL pool");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode_row(kind: EntityKind, row: &PgRow) -> Result<AggregatedRow, SourceError> {
        let decoded = match kind {
            EntityKind::Work => AggregatedRow::Work(WorkRow {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                rating: row.try_get("rating")?,
                modified: row.try_get("modified")?,
                categories: row.try_get::<Option<Value>, _>("categories")?,
                actors: row.try_get::<Option<Value>, _>("actors")?,
                directors: row.try_get::<Option<Value>, _>("directors")?,
                writers: row.try_get::<Option<Value>, _>("writers")?,
                person_modified: row.try_get::<Vec<DateTime<Utc>>, _>("person_modified")?,
                category_modified: row.try_get::<Vec<DateTime<Utc>>, _>("category_modified")?,
            }),
            EntityKind::Person => AggregatedRow::Person(PersonRow {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
                modified: row.try_get("modified")?,
                actor_work_ids: row.try_get("actor_work_ids")?,
                director_work_ids: row.try_get("director_work_ids")?,
                writer_work_ids: row.try_get("writer_work_ids")?,
                work_modified: row.try_get::<Vec<DateTime<Utc>>, _>("work_modified")?,
            }),
            EntityKind::Category => AggregatedRow::Category(CategoryRow {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                modified: row.try_get("modified")?,
            }),
        };
        Ok(decoded)
    }
}

#[async_trait]
impl SourceRepository for PostgresSource {
    #[instrument(skip(self, watermark, after), fields(kind = %kind))]
    async fn changed_ids(
        &self,
        kind: EntityKind,
        watermark: &Watermark,
        after: Option<&ChangedId>,
        limit: usize,
    ) -> Result<Vec<ChangedId>, SourceError> {
        let mut query = sqlx::query(queries::changed_ids(kind)).bind(watermark.own_or_epoch());
        for related in kind.related_kinds() {
            query = query.bind(watermark.related_or_epoch(*related));
        }

        let limit = i64::try_from(limit)
            .map_err(|_| SourceError::query(format!("page size {} out of range", limit)))?;

        let rows = query
            .bind(after.map(|a| a.modified))
            .bind(after.map(|a| a.id.clone()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let ids = rows
            .iter()
            .map(|row| {
                Ok(ChangedId {
                    id: row.try_get("id")?,
                    modified: row.try_get("modified")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(count = ids.len(), "Resolved changed ids");
        Ok(ids)
    }

    #[instrument(skip(self, ids), fields(kind = %kind, id_count = ids.len()))]
    async fn fetch_rows(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<AggregatedRow>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(queries::fetch_rows(kind))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        let decoded = rows
            .iter()
            .map(|row| Self::decode_row(kind, row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = decoded.len(), "Fetched aggregated rows");
        Ok(decoded)
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn max_modified(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>, SourceError> {
        let row = sqlx::query(queries::max_modified(kind))
            .fetch_one(&self.pool)
            .await?;
        let latest: Option<DateTime<Utc>> = row.try_get("modified")?;
        debug!(latest = ?latest, "Read high-water mark");
        Ok(latest)
    }
}
