//! Request descriptor: the persisted state of one export job.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::additional_info::AdditionalInfo;
use super::entry_query::EntryQuery;
use super::form::FormData;

/// Identifies what a CSV column holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ColumnId {
    /// A live form field.
    Field(i64),
    /// An additional information column.
    Info(AdditionalInfo),
    /// A field no longer present on the form.
    DeletedField(i64),
    /// A column contributed by a column provider.
    Custom(String),
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnId::Field(id) => write!(f, "{}", id),
            ColumnId::Info(info) => write!(f, "{}", info.slug()),
            ColumnId::DeletedField(id) => write!(f, "del_field_{}", id),
            ColumnId::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A header cell together with the column it labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub label: String,
}

impl Column {
    pub fn new(id: ColumnId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Everything needed to continue an export job across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub request_id: String,
    /// Form definition captured when the job started.
    pub form_data: FormData,
    pub db_args: EntryQuery,
    pub fields: Vec<i64>,
    pub additional_info: Vec<AdditionalInfo>,
    pub count: u64,
    pub step: u64,
    pub total_steps: u64,
    /// Header row, set by the step that writes it.
    #[serde(default)]
    pub columns_row: Option<Vec<Column>>,
}

impl RequestDescriptor {
    pub fn is_complete(&self) -> bool {
        self.step >= self.total_steps
    }

    pub fn entry_id(&self) -> Option<i64> {
        self.db_args.entry_id
    }

    pub fn includes_deleted_fields(&self) -> bool {
        self.additional_info.contains(&AdditionalInfo::DeletedFields)
    }

    /// The query for the current step.
    ///
    /// The page never reaches past `count` rows into the job.
    pub fn current_page(&self) -> EntryQuery {
        let per_step = self.db_args.number;
        let offset = shared::pagination::step_offset(self.step, per_step);
        let remaining = self.count.saturating_sub(offset);
        self.db_args.page(per_step.min(remaining), offset)
    }

    /// Progress report for the client.
    pub fn response(&self) -> StepResponse {
        if self.is_complete() {
            StepResponse {
                request_id: self.request_id.clone(),
                count: self.count,
                step: StepState::Stop,
                total_steps: None,
            }
        } else {
            StepResponse {
                request_id: self.request_id.clone(),
                count: self.count,
                step: StepState::Step(self.step),
                total_steps: Some(self.total_steps),
            }
        }
    }
}

/// Step position reported to the client: a number, or `"stop"` when done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Step(u64),
    Stop,
}

impl Serialize for StepState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepState::Step(step) => serializer.serialize_u64(*step),
            StepState::Stop => serializer.serialize_str("stop"),
        }
    }
}

/// Success payload of a step request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResponse {
    pub request_id: String,
    pub count: u64,
    pub step: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
}
