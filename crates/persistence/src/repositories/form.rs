//! Form repository for database operations.

use async_trait::async_trait;
use domain::models::{FormData, FormSummary};
use domain::services::FormsSource;
use domain::ExportError;
use sqlx::PgPool;
use tracing::warn;

use super::storage_error;
use crate::entities::FormEntity;
use crate::metrics::QueryTimer;

/// Repository for form definitions.
#[derive(Clone)]
pub struct FormRepository {
    pool: PgPool,
}

impl FormRepository {
    /// Creates a new FormRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds a form by id.
    pub async fn find_by_id(&self, form_id: i64) -> Result<Option<FormEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_by_id");
        let result = sqlx::query_as::<_, FormEntity>(
            r#"
            SELECT id, title, fields, created_at, updated_at
            FROM forms
            WHERE id = $1
            "#,
        )
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Lists every form ordered by title.
    pub async fn list_summaries(&self) -> Result<Vec<(i64, String)>, sqlx::Error> {
        let timer = QueryTimer::new("list_forms");
        let result = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT id, title
            FROM forms
            ORDER BY title, id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

#[async_trait]
impl FormsSource for FormRepository {
    async fn get_form(&self, form_id: i64) -> Result<Option<FormData>, ExportError> {
        let Some(entity) = self.find_by_id(form_id).await.map_err(storage_error)? else {
            return Ok(None);
        };

        entity.into_form_data().map(Some).map_err(|e| {
            warn!(form_id = form_id, error = %e, "Form definition cannot be decoded");
            ExportError::FormData
        })
    }

    async fn list_forms(&self) -> Result<Vec<FormSummary>, ExportError> {
        let rows = self.list_summaries().await.map_err(storage_error)?;
        Ok(rows
            .into_iter()
            .map(|(id, title)| FormSummary { id, title })
            .collect())
    }
}
