//! Entry repository for database operations.

use async_trait::async_trait;
use domain::models::{Entry, EntryNote, EntryQuery, ValueCompare, ValueFilter};
use domain::services::EntriesSource;
use domain::ExportError;
use sqlx::PgPool;

use super::storage_error;
use crate::entities::{EntryEntity, EntryNoteEntity};
use crate::metrics::QueryTimer;

/// Builds the WHERE clause shared by the count and page queries.
struct EntryFilterBuilder {
    conditions: Vec<String>,
    param_count: i32,
}

impl EntryFilterBuilder {
    fn build(query: &EntryQuery) -> Self {
        let mut conditions = vec!["e.form_id = $1".to_string()];
        let mut param_count = 1;

        if query.entry_id.is_some() {
            param_count += 1;
            conditions.push(format!("e.entry_id = ${}", param_count));
        }

        if query.max_entry_id.is_some() {
            param_count += 1;
            conditions.push(format!("e.entry_id <= ${}", param_count));
        }

        if query.date.is_some() {
            conditions.push(format!(
                "e.date >= ${} AND e.date <= ${}",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }

        if let Some(value) = &query.value {
            let mut exists = String::from(
                "EXISTS (SELECT 1 FROM entry_fields f WHERE f.entry_id = e.entry_id",
            );
            if value.field_id.is_some() {
                param_count += 1;
                exists.push_str(&format!(" AND f.field_id = ${}", param_count));
            }
            param_count += 1;
            let operator = match value.compare {
                ValueCompare::Is => "=",
                ValueCompare::IsNot => "<>",
                ValueCompare::Contains => "LIKE",
                ValueCompare::ContainsNot => "NOT LIKE",
            };
            exists.push_str(&format!(" AND f.value {} ${})", operator, param_count));
            conditions.push(exists);
        }

        Self {
            conditions,
            param_count,
        }
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }

    fn param_count(&self) -> i32 {
        self.param_count
    }
}

/// Bound form of the value filter: the raw term or a `LIKE` pattern.
fn value_param(value: &ValueFilter) -> String {
    match value.compare {
        ValueCompare::Is | ValueCompare::IsNot => value.value.clone(),
        ValueCompare::Contains | ValueCompare::ContainsNot => value.like_pattern(),
    }
}

/// Binds entry filter parameters in the order `EntryFilterBuilder` numbers them.
macro_rules! bind_entry_filters {
    ($builder:expr, $query:expr) => {{
        let mut b = $builder.bind($query.form_id);
        if let Some(entry_id) = $query.entry_id {
            b = b.bind(entry_id);
        }
        if let Some(max_entry_id) = $query.max_entry_id {
            b = b.bind(max_entry_id);
        }
        if let Some(window) = $query.date {
            b = b.bind(window.start).bind(window.end);
        }
        if let Some(ref value) = $query.value {
            if let Some(field_id) = value.field_id {
                b = b.bind(field_id);
            }
            b = b.bind(value_param(value));
        }
        b
    }};
}

/// Repository for entry related database operations.
#[derive(Clone)]
pub struct EntryRepository {
    pool: PgPool,
}

impl EntryRepository {
    /// Creates a new EntryRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Counts entries matching the filter.
    pub async fn count(&self, query: &EntryQuery) -> Result<i64, sqlx::Error> {
        let filter = EntryFilterBuilder::build(query);
        let sql = format!(
            "SELECT COUNT(DISTINCT e.entry_id) FROM entries e WHERE {}",
            filter.where_clause()
        );

        let timer = QueryTimer::new("count_entries");
        let builder = bind_entry_filters!(sqlx::query_scalar::<_, i64>(&sql), query);
        let result = builder.fetch_one(&self.pool).await;
        timer.record();
        result
    }

    /// Lists one page of matching entries, newest first.
    ///
    /// A zero `number` returns every match from `offset` on.
    pub async fn list(&self, query: &EntryQuery) -> Result<Vec<EntryEntity>, sqlx::Error> {
        let filter = EntryFilterBuilder::build(query);
        let limit = if query.number > 0 {
            format!("LIMIT ${} ", filter.param_count() + 1)
        } else {
            String::new()
        };
        let offset_param = filter.param_count() + if query.number > 0 { 2 } else { 1 };
        let sql = format!(
            r#"
            SELECT e.entry_id, e.form_id, e.post_id, e.user_id, e.status, e.type,
                   e.viewed, e.starred, e.fields, e.meta, e.date, e.date_modified,
                   e.ip_address, e.user_agent, e.user_uuid
            FROM entries e
            WHERE {}
            ORDER BY e.entry_id DESC
            {}OFFSET ${}
            "#,
            filter.where_clause(),
            limit,
            offset_param
        );

        let timer = QueryTimer::new("list_entries");
        let mut builder = bind_entry_filters!(sqlx::query_as::<_, EntryEntity>(&sql), query);
        if query.number > 0 {
            builder = builder.bind(clamp_i64(query.number));
        }
        let result = builder
            .bind(clamp_i64(query.offset))
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Ids of fields with stored values that are not part of the current form.
    pub async fn find_deleted_field_ids(
        &self,
        form_id: i64,
        existing: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let timer = QueryTimer::new("find_deleted_field_ids");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT field_id
            FROM entry_fields
            WHERE form_id = $1 AND NOT (field_id = ANY($2))
            ORDER BY field_id
            "#,
        )
        .bind(form_id)
        .bind(existing)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Notes of an entry with their authors, newest first.
    pub async fn find_notes(&self, entry_id: i64) -> Result<Vec<EntryNoteEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_entry_notes");
        let result = sqlx::query_as::<_, EntryNoteEntity>(
            r#"
            SELECT m.entry_id, m.user_id,
                   COALESCE(u.user_login, '') AS author_login,
                   COALESCE(u.first_name, '') AS author_first_name,
                   COALESCE(u.last_name, '') AS author_last_name,
                   m.date, m.data
            FROM entry_meta m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.entry_id = $1 AND m.type = 'note'
            ORDER BY m.id DESC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Data of the newest meta row of the given type.
    pub async fn find_meta_data(
        &self,
        entry_id: i64,
        meta_type: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let timer = QueryTimer::new("find_entry_meta_data");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT data
            FROM entry_meta
            WHERE entry_id = $1 AND type = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(entry_id)
        .bind(meta_type)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl EntriesSource for EntryRepository {
    async fn count_entries(&self, query: &EntryQuery) -> Result<u64, ExportError> {
        let count = self.count(query).await.map_err(storage_error)?;
        Ok(count.max(0) as u64)
    }

    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>, ExportError> {
        let entities = self.list(query).await.map_err(storage_error)?;
        Ok(entities.into_iter().map(Entry::from).collect())
    }

    async fn deleted_field_ids(
        &self,
        form_id: i64,
        existing: &[i64],
    ) -> Result<Vec<i64>, ExportError> {
        self.find_deleted_field_ids(form_id, existing)
            .await
            .map_err(storage_error)
    }

    async fn entry_notes(&self, entry_id: i64) -> Result<Vec<EntryNote>, ExportError> {
        let entities = self.find_notes(entry_id).await.map_err(storage_error)?;
        Ok(entities.into_iter().map(EntryNote::from).collect())
    }

    async fn entry_meta_data(
        &self,
        entry_id: i64,
        meta_type: &str,
    ) -> Result<Option<String>, ExportError> {
        self.find_meta_data(entry_id, meta_type)
            .await
            .map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{DateWindow, ExportArgs, RequestMethod};

    fn query() -> EntryQuery {
        EntryQuery::from_args(&ExportArgs {
            form_id: 7,
            ..ExportArgs::empty(RequestMethod::Post)
        })
    }

    #[test]
    fn test_filter_form_only() {
        let filter = EntryFilterBuilder::build(&query());
        assert_eq!(filter.where_clause(), "e.form_id = $1");
        assert_eq!(filter.param_count(), 1);
    }

    #[test]
    fn test_filter_all_conditions() {
        let mut q = query();
        q.entry_id = Some(3);
        q.date = DateWindow::between(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        q.value = Some(ValueFilter {
            value: "x".into(),
            compare: ValueCompare::ContainsNot,
            field_id: Some(2),
        });

        let filter = EntryFilterBuilder::build(&q);
        assert_eq!(
            filter.where_clause(),
            "e.form_id = $1 AND e.entry_id = $2 AND e.date >= $3 AND e.date <= $4 AND \
             EXISTS (SELECT 1 FROM entry_fields f WHERE f.entry_id = e.entry_id \
             AND f.field_id = $5 AND f.value NOT LIKE $6)"
        );
        assert_eq!(filter.param_count(), 6);
    }

    #[test]
    fn test_filter_snapshot_bound() {
        let mut q = query();
        q.max_entry_id = Some(40);
        q.value = Some(ValueFilter {
            value: "x".into(),
            compare: ValueCompare::Is,
            field_id: None,
        });

        let filter = EntryFilterBuilder::build(&q);
        assert_eq!(
            filter.where_clause(),
            "e.form_id = $1 AND e.entry_id <= $2 AND \
             EXISTS (SELECT 1 FROM entry_fields f WHERE f.entry_id = e.entry_id \
             AND f.value = $3)"
        );
        assert_eq!(filter.param_count(), 3);
    }

    #[test]
    fn test_filter_value_any_field() {
        let mut q = query();
        q.value = Some(ValueFilter {
            value: "jane".into(),
            compare: ValueCompare::Is,
            field_id: None,
        });
        let filter = EntryFilterBuilder::build(&q);
        assert!(filter.where_clause().ends_with("AND f.value = $2)"));
        assert_eq!(filter.param_count(), 2);
    }

    #[test]
    fn test_value_param() {
        let mut value = ValueFilter {
            value: "a_b".into(),
            compare: ValueCompare::Is,
            field_id: None,
        };
        assert_eq!(value_param(&value), "a_b");
        value.compare = ValueCompare::Contains;
        assert_eq!(value_param(&value), "%a\\_b%");
    }

    #[test]
    fn test_clamp_i64() {
        assert_eq!(clamp_i64(5), 5);
        assert_eq!(clamp_i64(u64::MAX), i64::MAX);
    }
}
