//! Form entries and their notes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One form submission.
///
/// `fields` and `meta` hold the JSON documents stored with the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: i64,
    pub form_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub status: String,
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

impl Entry {
    /// Submitted values keyed by field id.
    ///
    /// The stored document may be a JSON object keyed by id or a list; each
    /// item needs an `id` (number or numeric string). Missing values map to
    /// an empty string and unparsable documents to an empty map.
    pub fn fields_by_id(&self) -> HashMap<i64, String> {
        let mut by_id = HashMap::new();
        let parsed: Value = match serde_json::from_str(&self.fields) {
            Ok(value) => value,
            Err(_) => return by_id,
        };

        let items: Vec<&Value> = match &parsed {
            Value::Object(map) => map.values().collect(),
            Value::Array(list) => list.iter().collect(),
            _ => return by_id,
        };

        for item in items {
            let Some(id) = item.get("id").and_then(json_i64) else {
                continue;
            };
            let value = item.get("value").map(json_text).unwrap_or_default();
            by_id.insert(id, value);
        }
        by_id
    }
}

/// A note attached to an entry, with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNote {
    pub entry_id: i64,
    pub user_id: i64,
    pub author_login: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub date: DateTime<Utc>,
    pub data: String,
}

impl EntryNote {
    /// First name (or login when blank) followed by the last name.
    pub fn author_name(&self) -> String {
        let mut name = if self.author_first_name.is_empty() {
            self.author_login.clone()
        } else {
            self.author_first_name.clone()
        };
        if !self.author_last_name.is_empty() {
            name.push(' ');
            name.push_str(&self.author_last_name);
        }
        name
    }
}

/// Reads a JSON number or numeric string as an integer.
pub fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Renders a scalar JSON value as text; null and containers become empty.
pub fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}
