//! Entry query filter shared by the count and page queries.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use shared::validation::parse_calendar_date;

use super::export_args::{DateFilter, ExportArgs, SearchField};

/// Comparison applied to entry field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCompare {
    Is,
    IsNot,
    Contains,
    ContainsNot,
}

impl ValueCompare {
    /// Parses a comparison key; unknown keys fall back to `contains`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "is" => ValueCompare::Is,
            "is_not" => ValueCompare::IsNot,
            "contains_not" => ValueCompare::ContainsNot,
            _ => ValueCompare::Contains,
        }
    }
}

/// Filter on submitted field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFilter {
    pub value: String,
    pub compare: ValueCompare,
    /// Restricts the match to one field; `None` searches every field.
    pub field_id: Option<i64>,
}

impl ValueFilter {
    /// `LIKE` pattern for the contains comparisons, with wildcards escaped.
    pub fn like_pattern(&self) -> String {
        let escaped = self
            .value
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{}%", escaped)
    }
}

/// Inclusive entry date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// From the start of `from` to the end of `to`.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        let start = from.and_time(NaiveTime::MIN).and_utc();
        let end = to.and_hms_micro_opt(23, 59, 59, 999_999)?.and_utc();
        Some(Self { start, end })
    }

    /// Resolves the page's date filter. Unparsable dates drop the filter.
    pub fn from_filter(filter: &DateFilter) -> Option<Self> {
        match filter {
            DateFilter::None => None,
            DateFilter::Day(day) => {
                let day = parse_calendar_date(day)?;
                Self::between(day, day)
            }
            DateFilter::Range(from, to) => {
                Self::between(parse_calendar_date(from)?, parse_calendar_date(to)?)
            }
        }
    }
}

/// Normalized entry filter plus the paging window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    pub form_id: i64,
    /// Set only for single entry exports.
    pub entry_id: Option<i64>,
    pub date: Option<DateWindow>,
    pub value: Option<ValueFilter>,
    /// Newest entry a job covers; entries saved after it started stay out.
    #[serde(default)]
    pub max_entry_id: Option<i64>,
    pub number: u64,
    pub offset: u64,
}

impl EntryQuery {
    /// Builds the filter from export arguments, without paging.
    pub fn from_args(args: &ExportArgs) -> Self {
        let value = (!args.search.term.is_empty()).then(|| ValueFilter {
            value: args.search.term.clone(),
            compare: ValueCompare::from_key(&args.search.comparison),
            field_id: match args.search.field {
                SearchField::Any => None,
                SearchField::Field(id) => Some(id),
            },
        });

        Self {
            form_id: args.form_id,
            entry_id: (args.entry_id != 0).then_some(args.entry_id),
            date: DateWindow::from_filter(&args.dates),
            value,
            max_entry_id: None,
            number: 0,
            offset: 0,
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.entry_id.is_some()
    }

    /// The same filter positioned at `offset`, `number` rows long.
    pub fn page(&self, number: u64, offset: u64) -> Self {
        Self {
            number,
            offset,
            ..self.clone()
        }
    }
}
