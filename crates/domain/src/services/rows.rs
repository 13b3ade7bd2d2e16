//! Row materialization: header columns and entry rows for one step.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use shared::sanitize::{decode_html_entities, sanitize_text_field, strip_all_tags, ucwords};

use super::extensions::ExportExtensions;
use super::storage::EntriesSource;
use crate::errors::ExportError;
use crate::models::entry::json_text;
use crate::models::{AdditionalInfo, Column, ColumnId, Entry, FormData, RequestDescriptor};

const MAPS_URL: &str = "https://maps.google.com/maps";
const MAP_ZOOM: &str = "6";

/// Gateway detail labels in display order.
const GATEWAY_LABELS: [(&str, &str); 9] = [
    ("payment_type", "Payment gateway"),
    ("payment_recipient", "Recipient"),
    ("payment_transaction", "Transaction"),
    ("payment_total", "Total"),
    ("payment_currency", "Currency"),
    ("payment_mode", "Mode"),
    ("payment_subscription", "Subscription"),
    ("payment_customer", "Customer"),
    ("payment_period", "Period"),
];

/// Renders timestamps in the site's local time and display format.
#[derive(Debug, Clone)]
pub struct DateDisplay {
    format: String,
    gmt_offset_secs: i64,
}

impl DateDisplay {
    pub fn new(format: impl Into<String>, gmt_offset_hours: f64) -> Self {
        Self {
            format: format.into(),
            gmt_offset_secs: (gmt_offset_hours * 3600.0).round() as i64,
        }
    }

    pub fn render(&self, at: DateTime<Utc>) -> String {
        let local = (at + Duration::seconds(self.gmt_offset_secs)).naive_utc();
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.format)).is_err() {
            return local.format("%Y-%m-%d %H:%M:%S").to_string();
        }
        out
    }
}

/// Rows produced by one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBatch {
    /// Rows in file order; the header comes first when `has_header` is set.
    pub rows: Vec<Vec<String>>,
    pub has_header: bool,
}

impl ExportBatch {
    /// Number of entry rows, excluding the header.
    pub fn data_rows(&self) -> usize {
        self.rows.len() - usize::from(self.has_header)
    }
}

/// Turns entries into CSV rows for a request descriptor.
pub struct RowBuilder<'a> {
    entries: &'a dyn EntriesSource,
    extensions: &'a ExportExtensions,
    dates: &'a DateDisplay,
}

impl<'a> RowBuilder<'a> {
    pub fn new(
        entries: &'a dyn EntriesSource,
        extensions: &'a ExportExtensions,
        dates: &'a DateDisplay,
    ) -> Self {
        Self {
            entries,
            extensions,
            dates,
        }
    }

    /// Header columns: selected fields in selection order, additional
    /// information in declared order (deleted fields expanded in place),
    /// then extension columns.
    pub async fn columns(&self, descriptor: &RequestDescriptor) -> Result<Vec<Column>, ExportError> {
        let mut columns: Vec<Column> = Vec::new();
        let form = &descriptor.form_data;

        for id in &descriptor.fields {
            let Some(field) = form.field(*id) else {
                continue;
            };
            if columns.iter().all(|c| c.id != ColumnId::Field(*id)) {
                columns.push(Column::new(ColumnId::Field(*id), field.display_label()));
            }
        }

        for info in AdditionalInfo::ALL
            .into_iter()
            .filter(|info| descriptor.additional_info.contains(info))
        {
            if info == AdditionalInfo::DeletedFields {
                let deleted = self
                    .entries
                    .deleted_field_ids(descriptor.db_args.form_id, &form.field_ids())
                    .await?;
                columns.extend(deleted.into_iter().map(|id| {
                    Column::new(ColumnId::DeletedField(id), format!("Deleted field #{}", id))
                }));
            } else {
                columns.push(Column::new(ColumnId::Info(info), info.label()));
            }
        }

        columns.extend(self.extensions.extra_columns(descriptor));
        Ok(columns)
    }

    /// Rows of the descriptor's current page.
    ///
    /// The header is materialized, stored on the descriptor and emitted only
    /// when the descriptor has none yet. The descriptor is left untouched on
    /// error.
    pub async fn step_rows(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<ExportBatch, ExportError> {
        let page = descriptor.current_page();
        let entries = if page.number == 0 {
            Vec::new()
        } else {
            self.entries.get_entries(&page).await?
        };

        let (columns, new_header) = match &descriptor.columns_row {
            Some(columns) => (columns.clone(), false),
            None => (self.columns(descriptor).await?, true),
        };

        let mut batch = ExportBatch {
            rows: Vec::with_capacity(entries.len() + 1),
            has_header: new_header,
        };
        if new_header {
            batch
                .rows
                .push(columns.iter().map(|c| c.label.clone()).collect());
        }

        let no_fields = descriptor.form_data.fields.is_empty();
        let skip_all = no_fields && !descriptor.includes_deleted_fields();

        for entry in &entries {
            if skip_all {
                continue;
            }
            let row = self.entry_row(&columns, entry, &descriptor.form_data).await?;
            batch.rows.push(row);
        }

        if new_header {
            descriptor.columns_row = Some(columns);
        }
        Ok(batch)
    }

    async fn entry_row(
        &self,
        columns: &[Column],
        entry: &Entry,
        form: &FormData,
    ) -> Result<Vec<String>, ExportError> {
        let values = entry.fields_by_id();
        let mut row = Vec::with_capacity(columns.len());

        for column in columns {
            let raw = match &column.id {
                ColumnId::Field(id) | ColumnId::DeletedField(id) => {
                    values.get(id).cloned().unwrap_or_default()
                }
                ColumnId::Info(info) => self.additional_info_value(*info, entry, form).await?,
                ColumnId::Custom(_) => self
                    .extensions
                    .custom_value(column, entry)
                    .unwrap_or_default(),
            };
            row.push(decode_html_entities(&raw));
        }

        self.extensions.transform_row(columns, entry, &mut row);
        Ok(row)
    }

    /// Value of an additional information column for one entry.
    pub async fn additional_info_value(
        &self,
        info: AdditionalInfo,
        entry: &Entry,
        form: &FormData,
    ) -> Result<String, ExportError> {
        let value = match info {
            AdditionalInfo::EntryId => entry.entry_id.to_string(),
            AdditionalInfo::Date => self.dates.render(entry.date),
            AdditionalInfo::Notes => self.notes_value(entry).await?,
            AdditionalInfo::Viewed => u8::from(entry.viewed).to_string(),
            AdditionalInfo::Starred => u8::from(entry.starred).to_string(),
            AdditionalInfo::UserAgent => entry.user_agent.clone(),
            AdditionalInfo::IpAddress => entry.ip_address.clone(),
            AdditionalInfo::UserUuid => entry.user_uuid.clone(),
            AdditionalInfo::Geodata => self
                .entries
                .entry_meta_data(entry.entry_id, "location")
                .await?
                .map(|data| geodata_text(&data))
                .unwrap_or_default(),
            AdditionalInfo::PaymentStatus if form.has_payment() => payment_status(entry),
            AdditionalInfo::PaymentGatewayInfo if form.has_payment() => {
                self.gateway_info_value(entry).await?
            }
            AdditionalInfo::PaymentStatus
            | AdditionalInfo::PaymentGatewayInfo
            | AdditionalInfo::DeletedFields => String::new(),
        };
        Ok(value)
    }

    async fn notes_value(&self, entry: &Entry) -> Result<String, ExportError> {
        let notes = self.entries.entry_notes(entry.entry_id).await?;
        Ok(notes.iter().fold(String::new(), |mut out, note| {
            let _ = writeln!(
                out,
                "{}, {}: {}",
                self.dates.render(note.date),
                note.author_name(),
                strip_all_tags(&note.data)
            );
            out
        }))
    }

    async fn gateway_info_value(&self, entry: &Entry) -> Result<String, ExportError> {
        let data = match self.entries.entry_meta_data(entry.entry_id, "payment").await? {
            Some(data) if !data.is_empty() => data,
            _ if !entry.meta.is_empty() => entry.meta.clone(),
            _ => return Ok(String::new()),
        };
        Ok(gateway_info_text(&data))
    }
}

fn non_empty(location: &Map<String, Value>, key: &str) -> Option<String> {
    location
        .get(key)
        .map(json_text)
        .filter(|value| !value.is_empty() && value != "0")
}

/// Multi-line geolocation summary from a stored location document.
pub fn geodata_text(data: &str) -> String {
    let Ok(Value::Object(location)) = serde_json::from_str::<Value>(data) else {
        return String::new();
    };

    let city = non_empty(&location, "city");
    let region = non_empty(&location, "region");
    let latitude = non_empty(&location, "latitude");
    let longitude = non_empty(&location, "longitude");
    let postal = non_empty(&location, "postal");
    let country = non_empty(&location, "country");

    let place: Vec<&str> = [city.as_deref(), region.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let lat_long = latitude.zip(longitude);

    let mut lines: Vec<(&str, String)> = Vec::new();
    let mut map_params: Vec<(&str, String)> = Vec::new();

    if !place.is_empty() {
        map_params.push(("q", place.join(",")));
    }
    if let Some((lat, long)) = &lat_long {
        map_params.push(("ll", format!("{},{}", lat, long)));
        lines.push(("Lat/Long", format!("{}, {}", lat, long)));
    }
    if !map_params.is_empty() {
        map_params.push(("z", MAP_ZOOM.to_string()));
        map_params.push(("output", "embed".to_string()));
        if let Ok(map) = url::Url::parse_with_params(MAPS_URL, &map_params) {
            lines.push(("Map", map.to_string()));
        }
    }
    if !place.is_empty() {
        lines.push(("Location", place.join(", ")));
    }
    if let Some(postal) = postal {
        let label = if country.as_deref() == Some("US") {
            "Zipcode"
        } else {
            "Postal"
        };
        lines.push((label, postal));
    }
    if let Some(country) = country {
        lines.push(("Country", country));
    }

    lines.iter().fold(String::new(), |mut out, (label, value)| {
        let _ = writeln!(out, "{}: {}", label, value);
        out
    })
}

/// Payment status shown for an entry of a payment form.
pub fn payment_status(entry: &Entry) -> String {
    let status = sanitize_text_field(&entry.status);
    if !status.is_empty() {
        ucwords(&status)
    } else if entry.entry_type == "payment" {
        "Unknown".to_string()
    } else {
        "Completed".to_string()
    }
}

/// Gateway details from a payment document, one `payment_*` key per line
/// in document order. Known keys carry their label.
pub fn gateway_info_text(data: &str) -> String {
    let Ok(Value::Object(payment)) = serde_json::from_str::<Value>(data) else {
        return String::new();
    };

    let mut out = String::new();
    for (key, value) in &payment {
        if !key.contains("payment_") {
            continue;
        }
        match GATEWAY_LABELS.iter().find(|(k, _)| k == key) {
            Some((_, label)) => {
                let _ = writeln!(out, "{}: {}", label, json_text(value));
            }
            None => {
                let _ = writeln!(out, "{}", json_text(value));
            }
        }
    }
    out
}
