//! Entry entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{Entry, EntryNote};
use sqlx::FromRow;

/// Database row mapping for the entries table.
#[derive(Debug, Clone, FromRow)]
pub struct EntryEntity {
    pub entry_id: i64,
    pub form_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub status: String,
    #[sqlx(rename = "type")]
    pub entry_type: String,
    pub viewed: bool,
    pub starred: bool,
    pub fields: String,
    pub meta: String,
    pub date: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub user_uuid: String,
}

impl From<EntryEntity> for Entry {
    fn from(entity: EntryEntity) -> Self {
        Self {
            entry_id: entity.entry_id,
            form_id: entity.form_id,
            post_id: entity.post_id,
            user_id: entity.user_id,
            status: entity.status,
            entry_type: entity.entry_type,
            viewed: entity.viewed,
            starred: entity.starred,
            fields: entity.fields,
            meta: entity.meta,
            date: entity.date,
            date_modified: entity.date_modified,
            ip_address: entity.ip_address,
            user_agent: entity.user_agent,
            user_uuid: entity.user_uuid,
        }
    }
}

/// Entry note joined with its author.
#[derive(Debug, Clone, FromRow)]
pub struct EntryNoteEntity {
    pub entry_id: i64,
    pub user_id: i64,
    pub author_login: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub date: DateTime<Utc>,
    pub data: String,
}

impl From<EntryNoteEntity> for EntryNote {
    fn from(entity: EntryNoteEntity) -> Self {
        Self {
            entry_id: entity.entry_id,
            user_id: entity.user_id,
            author_login: entity.author_login,
            author_first_name: entity.author_first_name,
            author_last_name: entity.author_last_name,
            date: entity.date,
            data: entity.data,
        }
    }
}
