//! Extension points of the export.
//!
//! Extensions are registered explicitly on an [`ExportExtensions`] registry
//! when the service is assembled.

use std::sync::Arc;

use crate::models::{Column, Entry, ExportConfiguration, RequestDescriptor};

/// Adjusts the export configuration.
pub trait ConfigurationFilter: Send + Sync {
    fn filter(&self, config: ExportConfiguration) -> ExportConfiguration;
}

/// Contributes extra columns after the built-in ones.
pub trait ColumnProvider: Send + Sync {
    /// Columns to append; their ids should be `ColumnId::Custom`.
    fn columns(&self, descriptor: &RequestDescriptor) -> Vec<Column>;

    /// Value of one of this provider's columns, `None` for foreign columns.
    fn value(&self, column: &Column, entry: &Entry) -> Option<String>;
}

/// Post-processes a materialized row.
pub trait RowTransformer: Send + Sync {
    fn transform(&self, columns: &[Column], entry: &Entry, row: &mut Vec<String>);
}

/// Registry of export extensions.
#[derive(Clone, Default)]
pub struct ExportExtensions {
    configuration_filters: Vec<Arc<dyn ConfigurationFilter>>,
    column_providers: Vec<Arc<dyn ColumnProvider>>,
    row_transformers: Vec<Arc<dyn RowTransformer>>,
}

impl std::fmt::Debug for ExportExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportExtensions")
            .field("configuration_filters", &self.configuration_filters.len())
            .field("column_providers", &self.column_providers.len())
            .field("row_transformers", &self.row_transformers.len())
            .finish()
    }
}

impl ExportExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration_filter(mut self, filter: Arc<dyn ConfigurationFilter>) -> Self {
        self.configuration_filters.push(filter);
        self
    }

    pub fn with_column_provider(mut self, provider: Arc<dyn ColumnProvider>) -> Self {
        self.column_providers.push(provider);
        self
    }

    pub fn with_row_transformer(mut self, transformer: Arc<dyn RowTransformer>) -> Self {
        self.row_transformers.push(transformer);
        self
    }

    /// Runs every configuration filter in order, then restores any value a
    /// filter left unusable from `defaults`.
    pub fn apply_configuration(&self, defaults: &ExportConfiguration) -> ExportConfiguration {
        self.configuration_filters
            .iter()
            .fold(defaults.clone(), |config, filter| filter.filter(config))
            .merged_with(defaults)
    }

    /// Columns contributed by every provider, in registration order.
    pub fn extra_columns(&self, descriptor: &RequestDescriptor) -> Vec<Column> {
        self.column_providers
            .iter()
            .flat_map(|provider| provider.columns(descriptor))
            .collect()
    }

    /// First provider value for a custom column.
    pub fn custom_value(&self, column: &Column, entry: &Entry) -> Option<String> {
        self.column_providers
            .iter()
            .find_map(|provider| provider.value(column, entry))
    }

    pub fn transform_row(&self, columns: &[Column], entry: &Entry, row: &mut Vec<String>) {
        for transformer in &self.row_transformers {
            transformer.transform(columns, entry, row);
        }
    }
}
