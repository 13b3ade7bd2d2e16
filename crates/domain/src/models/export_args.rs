//! Normalized export request arguments.
//!
//! Raw parameters arrive as decoded `key=value` pairs, with the bracketed
//! keys the export page form produces (`fields[3]`, `additional_info[0]`,
//! `search[term]`). Every value is sanitized on the way in.

use serde::{Deserialize, Serialize};
use shared::sanitize::{intval, sanitize_key, sanitize_text_field};

/// Which parameter set an [`ExportArgs`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
}

/// Date filter as entered on the export page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateFilter {
    #[default]
    None,
    Day(String),
    Range(String, String),
}

impl DateFilter {
    /// Splits the `date` parameter on the literal `" - "` separator.
    ///
    /// One part is a single day, two parts a range; anything else is ignored.
    pub fn parse(raw: &str) -> Self {
        let sanitized = sanitize_text_field(raw);
        if sanitized.is_empty() {
            return DateFilter::None;
        }

        let parts: Vec<&str> = sanitized.split(" - ").collect();
        match parts.as_slice() {
            [day] => DateFilter::Day(day.to_string()),
            [from, to] => DateFilter::Range(sanitize_text_field(from), sanitize_text_field(to)),
            _ => DateFilter::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DateFilter::None)
    }
}

/// Field targeted by the entry search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Any,
    Field(i64),
}

/// Entry search: which field, how to compare, and the term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub field: SearchField,
    pub comparison: String,
    pub term: String,
}

impl Default for SearchArgs {
    fn default() -> Self {
        Self {
            field: SearchField::Any,
            comparison: "contains".to_string(),
            term: String::new(),
        }
    }
}

/// Sanitized export arguments from one parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArgs {
    pub method: RequestMethod,
    pub action: String,
    pub nonce: String,
    pub form_id: i64,
    pub entry_id: i64,
    pub fields: Vec<i64>,
    pub additional_info: Vec<String>,
    pub dates: DateFilter,
    pub search: SearchArgs,
    pub request_id: String,
}

impl ExportArgs {
    /// Empty arguments for the given method.
    pub fn empty(method: RequestMethod) -> Self {
        Self {
            method,
            action: String::new(),
            nonce: String::new(),
            form_id: 0,
            entry_id: 0,
            fields: Vec::new(),
            additional_info: Vec::new(),
            dates: DateFilter::None,
            search: SearchArgs::default(),
            request_id: String::new(),
        }
    }

    /// Builds arguments from decoded request pairs.
    ///
    /// Unknown keys are ignored. List keys accept both `name[]` and indexed
    /// `name[n]` spellings and keep the order of appearance.
    pub fn from_pairs<K, V>(method: RequestMethod, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut args = Self::empty(method);

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.is_empty() {
                continue;
            }

            match key {
                "action" => args.action = sanitize_text_field(value),
                "nonce" => args.nonce = sanitize_text_field(value),
                "form" => args.form_id = intval(value),
                "entry_id" => args.entry_id = intval(value),
                "date" => args.dates = DateFilter::parse(value),
                "request_id" => args.request_id = sanitize_text_field(value),
                "search[field]" => {
                    if let Ok(id) = value.trim().parse::<i64>() {
                        args.search.field = SearchField::Field(id);
                    }
                }
                "search[comparison]" => args.search.comparison = sanitize_key(value),
                "search[term]" => args.search.term = sanitize_text_field(value),
                _ if is_list_key(key, "fields") => args.fields.push(intval(value)),
                _ if is_list_key(key, "additional_info") => {
                    args.additional_info.push(sanitize_text_field(value))
                }
                _ => {}
            }
        }

        args
    }

    pub fn has_request_id(&self) -> bool {
        !self.request_id.is_empty()
    }
}

fn is_list_key(key: &str, name: &str) -> bool {
    key.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('['))
        .is_some_and(|rest| rest.ends_with(']') && !rest[..rest.len() - 1].contains('['))
}

/// Arguments of the current request, keyed by method so the query string
/// and the form body never overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestArgs {
    get: ExportArgs,
    post: ExportArgs,
}

impl Default for RequestArgs {
    fn default() -> Self {
        Self {
            get: ExportArgs::empty(RequestMethod::Get),
            post: ExportArgs::empty(RequestMethod::Post),
        }
    }
}

impl RequestArgs {
    pub fn new<K, V>(query: &[(K, V)], body: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            get: ExportArgs::from_pairs(RequestMethod::Get, query),
            post: ExportArgs::from_pairs(RequestMethod::Post, body),
        }
    }

    pub fn get(&self, method: RequestMethod) -> &ExportArgs {
        match method {
            RequestMethod::Get => &self.get,
            RequestMethod::Post => &self.post,
        }
    }

    /// The action, read from the body first and then the query string.
    pub fn action(&self) -> &str {
        if self.post.action.is_empty() {
            &self.get.action
        } else {
            &self.post.action
        }
    }

    /// The nonce, read from the body first and then the query string.
    pub fn nonce(&self) -> &str {
        if self.post.nonce.is_empty() {
            &self.get.nonce
        } else {
            &self.post.nonce
        }
    }

    /// Whether either parameter set names a form or a request id.
    pub fn targets_form_or_request(&self) -> bool {
        [&self.get, &self.post]
            .iter()
            .any(|args| args.form_id != 0 || args.has_request_id())
    }
}
