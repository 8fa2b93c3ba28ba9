//! Declarative per-dataset configuration.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use hdx_model::{AdminLevel, CellValue, HdxError, OutputLevel, Row};
use serde::{Deserialize, Serialize};

use crate::expr::Expression;
use crate::reducer::{REDUCER_VARIABLES, Reducer};

/// How the date column is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateKind {
    #[default]
    CalendarDate,
    /// Seconds since the Unix epoch.
    IntegerEpoch,
}

/// A `column = value` equality predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,
    pub value: String,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// A row lacking the column never matches.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.column)
            .is_some_and(|value| value.matches_text(&self.value))
    }
}

/// True when every filter matches (conjunction; empty passes).
pub fn filters_match(filters: &[FilterSpec], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

/// Expands repeated wide columns into one row per index.
///
/// `original` is a column name template where `#` stands for the index, e.g.
/// `"Population #"`; the matched value is copied into `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenRule {
    pub original: String,
    pub new: String,
}

impl FlattenRule {
    pub fn new(original: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            new: new.into(),
        }
    }
}

/// Where an output column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSource {
    /// Copy a source column.
    Column(String),
    /// Per-row arithmetic over numeric source columns.
    Expression { expression: String },
}

impl ValueSource {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    pub fn expression(source: impl Into<String>) -> Self {
        Self::Expression {
            expression: source.into(),
        }
    }

    /// Default output header.
    pub fn label(&self) -> &str {
        match self {
            Self::Column(name) => name,
            Self::Expression { expression } => expression,
        }
    }
}

/// A set of output columns with its own filters over the shared row stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorGroup {
    pub name: Option<String>,
    pub filters: Vec<FilterSpec>,
    pub columns: Vec<ValueSource>,
    /// Output headers, one per column; defaults to the column labels.
    pub headers: Vec<String>,
    pub reducer: Option<Reducer>,
    /// Emit the raw per-admin lists instead of a single value.
    pub keep_lists: bool,
}

impl IndicatorGroup {
    pub fn new(columns: Vec<ValueSource>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: &[&str]) -> Self {
        self.headers = headers.iter().map(|h| (*h).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = Some(reducer);
        self
    }

    #[must_use]
    pub fn keeping_lists(mut self) -> Self {
        self.keep_lists = true;
        self
    }

    pub fn output_headers(&self) -> Vec<String> {
        if self.headers.is_empty() {
            self.columns
                .iter()
                .map(|c| c.label().to_string())
                .collect()
        } else {
            self.headers.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-dataset aggregation schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    /// Source name used in audit records.
    #[serde(default)]
    pub name: String,
    /// Admin columns, country first. Empty means a global dataset.
    #[serde(default)]
    pub admin_columns: Vec<String>,
    /// Fixed country for datasets that only carry a subdivision column.
    #[serde(default)]
    pub country: Option<String>,
    /// Per admin column: raw token → code, consulted before the resolver.
    #[serde(default)]
    pub admin_overrides: Vec<BTreeMap<String, String>>,
    /// Only accept exact resolutions.
    #[serde(default)]
    pub admin_exact: bool,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub date_kind: DateKind,
    /// chrono format string for calendar dates.
    #[serde(default)]
    pub date_format: Option<String>,
    /// Date reported when the dataset has no date column.
    #[serde(default)]
    pub default_date: Option<NaiveDate>,
    #[serde(default)]
    pub ignore_future_dates: bool,
    /// Reference date for `ignore_future_dates`; the current date when unset.
    #[serde(default)]
    pub today: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub max_date_only: bool,
    /// Track freshness with one dataset-wide key instead of per admin unit.
    #[serde(default)]
    pub single_max_date: bool,
    #[serde(default)]
    pub prefilter: Vec<FilterSpec>,
    #[serde(default)]
    pub flatten: Vec<FlattenRule>,
    #[serde(default)]
    pub groups: Vec<IndicatorGroup>,
}

impl Default for RowSchema {
    fn default() -> Self {
        Self {
            name: String::new(),
            admin_columns: Vec::new(),
            country: None,
            admin_overrides: Vec::new(),
            admin_exact: false,
            date_column: None,
            date_kind: DateKind::default(),
            date_format: None,
            default_date: None,
            ignore_future_dates: false,
            today: None,
            max_date_only: true,
            single_max_date: false,
            prefilter: Vec::new(),
            flatten: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl RowSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_admin_columns(mut self, columns: &[&str]) -> Self {
        self.admin_columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    #[must_use]
    pub fn with_date(mut self, column: impl Into<String>, kind: DateKind) -> Self {
        self.date_column = Some(column.into());
        self.date_kind = kind;
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: IndicatorGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn with_flatten(mut self, rule: FlattenRule) -> Self {
        self.flatten.push(rule);
        self
    }

    #[must_use]
    pub fn with_prefilter(mut self, filter: FilterSpec) -> Self {
        self.prefilter.push(filter);
        self
    }

    /// Level of the admin column at `position`.
    pub fn admin_level(&self, position: usize) -> Option<AdminLevel> {
        let offset = usize::from(self.country.is_some());
        AdminLevel::from_column_position(position + offset)
    }

    /// Output level the dataset publishes at.
    pub fn output_level(&self) -> OutputLevel {
        let depth = self.admin_columns.len() + usize::from(self.country.is_some());
        OutputLevel::for_admin_depth(depth)
    }

    /// Checks the schema for inconsistencies that would make every pass fail.
    pub fn validate(&self) -> Result<(), HdxError> {
        let fail = |message: String| {
            HdxError::configuration(format!("dataset '{}': {message}", self.name))
        };

        if self
            .admin_columns
            .iter()
            .enumerate()
            .any(|(position, _)| self.admin_level(position).is_none())
        {
            return Err(fail(format!(
                "{} admin columns given but only country and subdivision levels exist",
                self.admin_columns.len()
            )));
        }
        if self.admin_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(fail("empty admin column name".to_string()));
        }
        if self.admin_overrides.len() > self.admin_columns.len() {
            return Err(fail("more admin override tables than admin columns".to_string()));
        }
        if self.date_format.is_some() && self.date_kind != DateKind::CalendarDate {
            return Err(fail("date_format only applies to calendar dates".to_string()));
        }
        if self.ignore_future_dates && self.date_column.is_none() {
            return Err(fail("ignore_future_dates needs a date column".to_string()));
        }
        if self.groups.is_empty() {
            return Err(fail("no indicator groups".to_string()));
        }

        let filters = self
            .prefilter
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.filters.iter()));
        for filter in filters {
            if filter.column.trim().is_empty() {
                return Err(fail("filter with empty column".to_string()));
            }
        }

        for rule in &self.flatten {
            if !rule.original.contains('#') {
                return Err(fail(format!(
                    "flatten template '{}' has no '#' placeholder",
                    rule.original
                )));
            }
            if rule.new.trim().is_empty() {
                return Err(fail(format!("flatten template '{}' has no target", rule.original)));
            }
        }

        for (idx, group) in self.groups.iter().enumerate() {
            let label = group.name.clone().unwrap_or_else(|| format!("#{idx}"));
            if group.columns.is_empty() {
                return Err(fail(format!("group {label} has no columns")));
            }
            if !group.headers.is_empty() && group.headers.len() != group.columns.len() {
                return Err(fail(format!(
                    "group {label} has {} headers for {} columns",
                    group.headers.len(),
                    group.columns.len()
                )));
            }
            for column in &group.columns {
                if let ValueSource::Expression { expression } = column {
                    Expression::parse(expression).map_err(|e| {
                        fail(format!("group {label}: invalid expression '{expression}': {e}"))
                    })?;
                }
            }
            if let Some(Reducer::Expression { expression }) = &group.reducer {
                let parsed = Expression::parse(expression).map_err(|e| {
                    fail(format!("group {label}: invalid reducer '{expression}': {e}"))
                })?;
                if let Some(unknown) = parsed
                    .variables()
                    .into_iter()
                    .find(|name| !REDUCER_VARIABLES.contains(name))
                {
                    return Err(fail(format!(
                        "group {label}: reducer variable '{unknown}' is not one of {}",
                        REDUCER_VARIABLES.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Reads `column` from `row` as text, empty when absent.
pub(crate) fn text_of(row: &Row, column: &str) -> String {
    row.get(column).map(CellValue::to_text).unwrap_or_default()
}
