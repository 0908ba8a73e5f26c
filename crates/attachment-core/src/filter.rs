//! # Metadata Filters
//!
//! A small filter language for the metadata store: equality and ordered
//! comparisons against a column, plus `IN` lists. All conditions are
//! combined with AND. SQL-backed stores translate a [`Filter`] into a
//! `WHERE` clause; in-memory stores evaluate it with [`Filter::matches`].
//!
//! A condition on a column that is NULL for a record never matches,
//! mirroring SQL three-valued logic.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::record::AttachmentRecord;

/// Filterable columns of the attachment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// `id`
    Id,
    /// `integrity_hash`
    IntegrityHash,
    /// `owner`
    Owner,
    /// `filename`
    Filename,
    /// `created_at`
    CreatedAt,
    /// `updated_at`
    UpdatedAt,
}

impl Column {
    /// SQL column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::IntegrityHash => "integrity_hash",
            Self::Owner => "owner",
            Self::Filename => "filename",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn value_of(&self, record: &AttachmentRecord) -> Option<FilterValue> {
        match self {
            Self::Id => Some(FilterValue::Uuid(record.id)),
            Self::IntegrityHash => Some(FilterValue::Text(record.integrity_hash.clone())),
            Self::Owner => Some(FilterValue::Text(record.owner.clone())),
            Self::Filename => record.filename.clone().map(FilterValue::Text),
            Self::CreatedAt => Some(FilterValue::Timestamp(record.created_at)),
            Self::UpdatedAt => Some(FilterValue::Timestamp(record.updated_at)),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl Comparison {
    /// SQL operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A typed value to compare a column against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    /// UUID value.
    Uuid(Uuid),
    /// Text value.
    Text(String),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// One predicate of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column <op> value`
    Compare {
        /// Column to test.
        column: Column,
        /// Operator.
        op: Comparison,
        /// Right-hand side.
        value: FilterValue,
    },
    /// `column IN (values…)`; an empty list matches nothing.
    In {
        /// Column to test.
        column: Column,
        /// Accepted values.
        values: Vec<FilterValue>,
    },
}

impl Condition {
    fn matches(&self, record: &AttachmentRecord) -> bool {
        match self {
            Self::Compare { column, op, value } => column
                .value_of(record)
                .and_then(|actual| actual.compare(value))
                .is_some_and(|ordering| op.holds(ordering)),
            Self::In { column, values } => column
                .value_of(record)
                .is_some_and(|actual| values.contains(&actual)),
        }
    }
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the primary key.
    pub fn by_id(id: Uuid) -> Self {
        Self::new().equals(Column::Id, id)
    }

    /// Filter on the integrity hash.
    pub fn by_integrity_hash(hash: impl Into<String>) -> Self {
        Self::new().equals(Column::IntegrityHash, hash.into())
    }

    /// Add `column = value`.
    pub fn equals(self, column: Column, value: impl Into<FilterValue>) -> Self {
        self.compare(column, Comparison::Eq, value)
    }

    /// Add `column <op> value`.
    pub fn compare(mut self, column: Column, op: Comparison, value: impl Into<FilterValue>) -> Self {
        self.conditions.push(Condition::Compare {
            column,
            op,
            value: value.into(),
        });
        self
    }

    /// Add `column IN (values…)`.
    pub fn is_in<V: Into<FilterValue>>(
        mut self,
        column: Column,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// The accumulated conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &AttachmentRecord) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewAttachment;
    use chrono::Duration;

    fn record() -> AttachmentRecord {
        NewAttachment {
            integrity_hash: "QmZULkCELmmk5XNfCgTnCyFgAVxBRBXyDHGGMVoLFLiXEN".to_string(),
            owner: "0xowner".to_string(),
            filename: None,
            size: Some(6),
            encoding: None,
        }
        .into_record(Utc::now())
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&record()));
    }

    #[test]
    fn equality_on_id_and_hash() {
        let rec = record();
        assert!(Filter::by_id(rec.id).matches(&rec));
        assert!(!Filter::by_id(Uuid::new_v4()).matches(&rec));
        assert!(Filter::by_integrity_hash(rec.integrity_hash.clone()).matches(&rec));
    }

    #[test]
    fn timestamp_comparisons() {
        let rec = record();
        let before = rec.updated_at - Duration::seconds(1);
        let after = rec.updated_at + Duration::seconds(1);
        let f = |op, at| Filter::new().compare(Column::UpdatedAt, op, at);
        assert!(f(Comparison::Gt, before).matches(&rec));
        assert!(!f(Comparison::Gt, after).matches(&rec));
        assert!(f(Comparison::Gte, rec.updated_at).matches(&rec));
        assert!(f(Comparison::Lte, rec.updated_at).matches(&rec));
        assert!(f(Comparison::Lt, after).matches(&rec));
        assert!(f(Comparison::Ne, after).matches(&rec));
    }

    #[test]
    fn in_list() {
        let rec = record();
        assert!(Filter::new()
            .is_in(Column::Id, [Uuid::new_v4(), rec.id])
            .matches(&rec));
        assert!(!Filter::new()
            .is_in(Column::Id, Vec::<Uuid>::new())
            .matches(&rec));
    }

    #[test]
    fn null_column_never_matches() {
        let rec = record();
        assert!(!Filter::new().equals(Column::Filename, "a").matches(&rec));
        assert!(!Filter::new()
            .compare(Column::Filename, Comparison::Ne, "a")
            .matches(&rec));
    }

    #[test]
    fn mismatched_value_types_never_match() {
        let rec = record();
        assert!(!Filter::new().equals(Column::Id, "not-a-uuid").matches(&rec));
    }

    #[test]
    fn conditions_are_conjunctive() {
        let rec = record();
        let filter = Filter::by_id(rec.id).equals(Column::Owner, "0xsomeone-else");
        assert_eq!(filter.conditions().len(), 2);
        assert!(!filter.matches(&rec));
    }
}
