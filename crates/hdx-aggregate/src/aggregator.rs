//! Folding a row stream into admin-keyed value maps.
//!
//! One [`RowAggregator`] serves one pass over one dataset: rows are ingested
//! one at a time and [`RowAggregator::finish`] consumes the aggregator, so a
//! finalized pass can never be fed again.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use hdx_match::AdminResolver;
use hdx_model::{AdminLevel, AuditBundle, CellValue, HdxError, ResolutionMethod, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::dates::parse_date;
use crate::expr::Expression;
use crate::flatten::Flatten;
use crate::reducer::CompiledReducer;
use crate::schema::{IndicatorGroup, RowSchema, ValueSource, filters_match, text_of};

/// Key of the single output entry of a dataset without admin columns.
pub const GLOBAL_KEY: &str = "global";

/// Freshness key used by `single_max_date`.
const DATASET_KEY: &str = "";

/// An aggregated cell: one value, or the raw list in pre-reduction mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    List(Vec<CellValue>),
    Single(CellValue),
}

impl OutputValue {
    pub fn as_single(&self) -> Option<&CellValue> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CellValue]> {
        match self {
            Self::List(values) => Some(values),
            Self::Single(_) => None,
        }
    }
}

impl From<CellValue> for OutputValue {
    fn from(value: CellValue) -> Self {
        Self::Single(value)
    }
}

/// Result of one indicator group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupOutput {
    pub name: Option<String>,
    pub headers: Vec<String>,
    /// One admin code → value map per header.
    pub values: Vec<BTreeMap<String, OutputValue>>,
    /// Latest date among the retained rows, or the dataset default.
    pub date: Option<NaiveDate>,
}

impl GroupOutput {
    /// Value of `header` for `admin`.
    pub fn value(&self, header: &str, admin: &str) -> Option<&OutputValue> {
        let idx = self.headers.iter().position(|h| h == header)?;
        self.values.get(idx)?.get(admin)
    }
}

/// Row counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Source rows ingested.
    pub rows: usize,
    /// Rows produced by flatten expansion (equal to `rows` without rules).
    pub expanded: usize,
    /// Expanded rows whose admin unit could not be resolved.
    pub dropped: usize,
    /// Rows rejected by the prefilter, plus per-group filter rejections.
    pub filtered: usize,
    /// Group contributions discarded as older than the stored maximum date.
    pub stale: usize,
    /// Rows dated after `today`.
    pub future: usize,
    /// Rows with a blank date cell.
    pub undated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateOutput {
    pub groups: Vec<GroupOutput>,
    /// Latest date used across all groups.
    pub max_date: Option<NaiveDate>,
    pub audit: AuditBundle,
    pub stats: AggregateStats,
}

/// Compiled per-group settings.
enum CompiledSource {
    Column(String),
    Expression(Expression),
}

struct GroupState {
    sources: Vec<CompiledSource>,
    reducer: Option<CompiledReducer>,
    /// Per column: admin code → values at the current maximum date.
    values: Vec<BTreeMap<String, Vec<CellValue>>>,
    max_dates: HashMap<String, NaiveDateTime>,
}

impl GroupState {
    fn new(group: &IndicatorGroup) -> Result<Self, HdxError> {
        let sources = group
            .columns
            .iter()
            .map(|source| match source {
                ValueSource::Column(name) => Ok(CompiledSource::Column(name.clone())),
                ValueSource::Expression { expression } => Expression::parse(expression)
                    .map(CompiledSource::Expression)
                    .map_err(|e| {
                        HdxError::configuration(format!("invalid expression '{expression}': {e}"))
                    }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let reducer = group
            .reducer
            .as_ref()
            .map(|reducer| {
                reducer
                    .compile()
                    .map_err(|e| HdxError::configuration(format!("invalid reducer: {e}")))
            })
            .transpose()?;
        Ok(Self {
            values: vec![BTreeMap::new(); sources.len()],
            sources,
            reducer,
            max_dates: HashMap::new(),
        })
    }

    fn extract(&self, row: &Row) -> Vec<CellValue> {
        self.sources
            .iter()
            .map(|source| match source {
                CompiledSource::Column(name) => row.get(name).cloned().unwrap_or_default(),
                CompiledSource::Expression(expr) => {
                    let lookup = |name: &str| row.get(name).and_then(CellValue::as_f64);
                    match expr.evaluate(&lookup) {
                        Ok(value) => CellValue::from_number(value),
                        Err(e) => {
                            debug!(expression = %expr, error = %e, "expression yielded no value");
                            CellValue::Null
                        }
                    }
                }
            })
            .collect()
    }

    fn append(&mut self, admin: &str, row_values: Vec<CellValue>) {
        for (column, value) in self.values.iter_mut().zip(row_values) {
            column.entry(admin.to_string()).or_default().push(value);
        }
    }

    fn clear_admin(&mut self, admin: &str) {
        for column in &mut self.values {
            column.remove(admin);
        }
    }

    fn clear_all(&mut self) {
        for column in &mut self.values {
            column.clear();
        }
    }
}

/// Date of a row that passed a group filter.
#[derive(Debug, Clone, Copy)]
enum RowDate {
    Dated(NaiveDateTime),
    NoColumn,
    Blank,
    Future,
}

fn read_row_date(schema: &RowSchema, today: NaiveDate, row: &Row) -> Result<RowDate, HdxError> {
    let Some(column) = &schema.date_column else {
        return Ok(RowDate::NoColumn);
    };
    let value = row.get(column).cloned().unwrap_or_default();
    let parsed = parse_date(
        &value,
        schema.date_kind,
        schema.date_format.as_deref(),
        column,
    )?;
    Ok(match parsed {
        None => RowDate::Blank,
        Some(date) if schema.ignore_future_dates && date.date() > today => RowDate::Future,
        Some(date) => RowDate::Dated(date),
    })
}

/// Aggregates one dataset's rows through an [`AdminResolver`].
pub struct RowAggregator<'s, 'r, 'a> {
    schema: &'s RowSchema,
    resolver: &'r AdminResolver<'a>,
    groups: Vec<GroupState>,
    today: NaiveDate,
    audit: AuditBundle,
    stats: AggregateStats,
}

impl<'s, 'r, 'a> RowAggregator<'s, 'r, 'a> {
    /// Validates `schema` and prepares an empty pass.
    pub fn new(schema: &'s RowSchema, resolver: &'r AdminResolver<'a>) -> Result<Self, HdxError> {
        schema.validate()?;
        let groups = schema
            .groups
            .iter()
            .map(GroupState::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            resolver,
            groups,
            today: schema.today.unwrap_or_else(|| Utc::now().date_naive()),
            audit: AuditBundle::new(),
            stats: AggregateStats::default(),
        })
    }

    /// Runs a whole pass: validate, ingest every row, finalize.
    ///
    /// A data format error aborts the pass; no partial output is returned.
    pub fn process<I>(
        schema: &'s RowSchema,
        resolver: &'r AdminResolver<'a>,
        rows: I,
    ) -> Result<AggregateOutput, HdxError>
    where
        I: IntoIterator,
        I::Item: Borrow<Row>,
    {
        let span = info_span!("aggregate", dataset = %schema.name);
        let _guard = span.enter();

        let mut aggregator = Self::new(schema, resolver)?;
        for row in rows {
            aggregator.ingest(row.borrow())?;
        }
        let output = aggregator.finish();
        info!(
            rows = output.stats.rows,
            dropped = output.stats.dropped,
            stale = output.stats.stale,
            max_date = ?output.max_date,
            "dataset aggregated"
        );
        Ok(output)
    }

    /// Folds one source row: flatten, resolve, filter, date-compare, store.
    pub fn ingest(&mut self, row: &Row) -> Result<(), HdxError> {
        self.stats.rows += 1;
        if !filters_match(&self.schema.prefilter, row) {
            self.stats.filtered += 1;
            return Ok(());
        }
        for expanded in Flatten::new(row, &self.schema.flatten) {
            self.stats.expanded += 1;
            self.ingest_expanded(&expanded)?;
        }
        Ok(())
    }

    fn ingest_expanded(&mut self, row: &Row) -> Result<(), HdxError> {
        let schema = self.schema;
        let Some(admin) = self.resolve_admin(row) else {
            self.stats.dropped += 1;
            return Ok(());
        };

        let today = self.today;
        let mut row_date = None;
        for (group, state) in schema.groups.iter().zip(&mut self.groups) {
            if !filters_match(&group.filters, row) {
                self.stats.filtered += 1;
                continue;
            }
            let dated = match row_date {
                Some(dated) => dated,
                None => *row_date.insert(read_row_date(schema, today, row)?),
            };
            let date = match dated {
                RowDate::Dated(date) => Some(date),
                RowDate::NoColumn => None,
                RowDate::Blank => {
                    self.stats.undated += 1;
                    return Ok(());
                }
                RowDate::Future => {
                    self.stats.future += 1;
                    return Ok(());
                }
            };
            let values = state.extract(row);

            let Some(date) = date.filter(|_| schema.max_date_only) else {
                state.append(&admin, values);
                if let Some(date) = date {
                    let latest = state.max_dates.entry(DATASET_KEY.to_string()).or_insert(date);
                    *latest = (*latest).max(date);
                }
                continue;
            };

            let key = if schema.single_max_date {
                DATASET_KEY
            } else {
                admin.as_str()
            };
            match state.max_dates.get(key).copied() {
                Some(current) if date < current => {
                    self.stats.stale += 1;
                }
                Some(current) if date == current => {
                    state.append(&admin, values);
                }
                previous => {
                    if previous.is_some() {
                        if schema.single_max_date {
                            state.clear_all();
                        } else {
                            state.clear_admin(&admin);
                        }
                    }
                    state.max_dates.insert(key.to_string(), date);
                    state.append(&admin, values);
                }
            }
        }
        Ok(())
    }

    /// Resolves the row's admin chain; `None` drops the row.
    fn resolve_admin(&mut self, row: &Row) -> Option<String> {
        let schema = self.schema;
        if schema.admin_columns.is_empty() {
            return Some(
                schema
                    .country
                    .clone()
                    .unwrap_or_else(|| GLOBAL_KEY.to_string()),
            );
        }

        let mut country = schema.country.clone().unwrap_or_default();
        let mut code = None;
        for (position, column) in schema.admin_columns.iter().enumerate() {
            let level = schema.admin_level(position)?;
            let token = text_of(row, column);

            let overridden = schema
                .admin_overrides
                .get(position)
                .and_then(|table| table.get(token.trim()))
                .filter(|code| self.resolver.index().contains(code, level));
            let resolved = match overridden {
                Some(code) => code.clone(),
                None => {
                    let result = self.resolver.resolve(&country, &token, level, &schema.name);
                    self.audit.record_result(&result);
                    if schema.admin_exact && result.method != ResolutionMethod::Exact {
                        return None;
                    }
                    result.code?
                }
            };
            if level == AdminLevel::Country {
                country.clone_from(&resolved);
            }
            code = Some(resolved);
        }
        code
    }

    /// Finalizes the pass.
    pub fn finish(self) -> AggregateOutput {
        let mut groups = Vec::with_capacity(self.groups.len());
        let mut max_date: Option<NaiveDate> = None;

        for (group, state) in self.schema.groups.iter().zip(self.groups) {
            let date = state
                .max_dates
                .values()
                .max()
                .map(NaiveDateTime::date)
                .or(self.schema.default_date);
            max_date = max_date.max(date);

            let reducer = state.reducer.as_ref();
            let values = state
                .values
                .into_iter()
                .map(|column| {
                    column
                        .into_iter()
                        .map(|(admin, list)| {
                            let value = finalize_value(group, reducer, list, &admin);
                            (admin, value)
                        })
                        .collect()
                })
                .collect();

            groups.push(GroupOutput {
                name: group.name.clone(),
                headers: group.output_headers(),
                values,
                date,
            });
        }

        AggregateOutput {
            groups,
            max_date,
            audit: self.audit,
            stats: self.stats,
        }
    }
}

fn finalize_value(
    group: &IndicatorGroup,
    reducer: Option<&CompiledReducer>,
    mut list: Vec<CellValue>,
    admin: &str,
) -> OutputValue {
    if group.keep_lists {
        return OutputValue::List(list);
    }
    match reducer {
        Some(reducer) => reduce_or_null(reducer, &list, admin),
        // Latest ingested value among those sharing the maximum date.
        None => OutputValue::Single(list.pop().unwrap_or_default()),
    }
}

fn reduce_or_null(reducer: &CompiledReducer, list: &[CellValue], admin: &str) -> OutputValue {
    match reducer.reduce(list) {
        Ok(value) => OutputValue::Single(value),
        Err(e) => {
            warn!(admin, error = %e, "reducer failed; emitting null");
            OutputValue::Single(CellValue::Null)
        }
    }
}
