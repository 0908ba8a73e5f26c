//! Postgres-backed attachment store.
//!
//! Filters are rendered with `QueryBuilder`; every value is bound, only
//! column names and operators from the closed [`Column`]/[`Comparison`]
//! enums are spliced into the SQL text.
//!
//! [`Column`]: attachment_core::Column
//! [`Comparison`]: attachment_core::Comparison

use async_trait::async_trait;
use attachment_core::{
    AttachmentPatch, AttachmentRecord, Condition, Filter, FilterValue, HashEncoding,
    NewAttachment,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{AttachmentStore, MetadataError};

const COLUMNS: &str =
    "id, integrity_hash, owner, filename, size, encoding, created_at, updated_at";

/// Attachment store over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgAttachmentStore {
    pool: PgPool,
}

impl PgAttachmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: Uuid,
    integrity_hash: String,
    owner: String,
    filename: Option<String>,
    size: Option<i64>,
    encoding: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttachmentRow {
    fn into_record(self) -> Result<AttachmentRecord, MetadataError> {
        let encoding = self
            .encoding
            .as_deref()
            .map(str::parse::<HashEncoding>)
            .transpose()
            .map_err(|e| MetadataError::CorruptRow {
                id: self.id,
                reason: e.to_string(),
            })?;
        Ok(AttachmentRecord {
            id: self.id,
            integrity_hash: self.integrity_hash,
            owner: self.owner,
            filename: self.filename,
            size: self.size,
            encoding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Uuid(v) => qb.push_bind(*v),
        FilterValue::Text(v) => qb.push_bind(v.clone()),
        FilterValue::Timestamp(v) => qb.push_bind(*v),
    };
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (i, condition) in filter.conditions().iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Compare { column, op, value } => {
                qb.push(column.as_str()).push(" ").push(op.as_sql()).push(" ");
                push_value(qb, value);
            }
            Condition::In { values, .. } if values.is_empty() => {
                qb.push("FALSE");
            }
            Condition::In { column, values } => {
                qb.push(column.as_str()).push(" IN (");
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, value);
                }
                qb.push(")");
            }
        }
    }
}

#[async_trait]
impl AttachmentStore for PgAttachmentStore {
    async fn get(&self, filter: &Filter) -> Result<Vec<AttachmentRecord>, MetadataError> {
        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM attachment"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC");

        let rows = qb
            .build_query_as::<AttachmentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(AttachmentRow::into_record).collect()
    }

    async fn insert(&self, attachment: NewAttachment) -> Result<AttachmentRecord, MetadataError> {
        let record = attachment.into_record(Utc::now());
        let row = sqlx::query_as::<_, AttachmentRow>(&format!(
            "INSERT INTO attachment ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(record.id)
        .bind(&record.integrity_hash)
        .bind(&record.owner)
        .bind(&record.filename)
        .bind(record.size)
        .bind(record.encoding.map(|e| e.as_str()))
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;
        row.into_record()
    }

    async fn update(
        &self,
        filter: &Filter,
        patch: &AttachmentPatch,
    ) -> Result<u64, MetadataError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE attachment SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(filename) = &patch.filename {
            qb.push(", filename = ").push_bind(filename.clone());
        }
        if let Some(size) = patch.size {
            qb.push(", size = ").push_bind(size);
        }
        if let Some(encoding) = patch.encoding {
            qb.push(", encoding = ").push_bind(encoding.as_str());
        }
        push_filter(&mut qb, filter);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, filter: &Filter) -> Result<u64, MetadataError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM attachment");
        push_filter(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), MetadataError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attachment_core::{Column, Comparison};

    fn render(filter: &Filter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM attachment");
        push_filter(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        assert_eq!(render(&Filter::new()), "SELECT * FROM attachment");
    }

    #[test]
    fn conditions_are_bound_and_joined() {
        let filter = Filter::new()
            .compare(Column::UpdatedAt, Comparison::Gt, Utc::now())
            .equals(Column::IntegrityHash, "abc")
            .is_in(Column::Id, [Uuid::nil(), Uuid::max()]);
        assert_eq!(
            render(&filter),
            "SELECT * FROM attachment WHERE updated_at > $1 AND integrity_hash = $2 \
             AND id IN ($3, $4)"
        );
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let filter = Filter::new().is_in(Column::Id, Vec::<Uuid>::new());
        assert_eq!(render(&filter), "SELECT * FROM attachment WHERE FALSE");
    }
}
