//! Dataset passes as units of work.

use std::borrow::Cow;
use std::path::PathBuf;

use anyhow::{Context, Result};
use hdx_aggregate::{
    AggregateOutput, GLOBAL_KEY, IndicatorGroup, RowAggregator, RowSchema, read_csv_frame,
    rows_from_frame,
};
use hdx_match::AdminResolver;
use hdx_model::{OutputLevel, Row};
use tracing::info;

use crate::config::RunConfig;
use crate::coordinator::{OutputShape, RunCoordinator, RunReport, SourceOutput};
use crate::fallback::SourceCitation;

/// Where a dataset's rows come from.
#[derive(Debug, Clone)]
pub enum RowSource {
    /// Rows decoded by the caller.
    Rows(Vec<Row>),
    /// A headed CSV file, read when the job runs.
    Csv(PathBuf),
}

impl From<AggregateOutput> for SourceOutput {
    fn from(output: AggregateOutput) -> Self {
        let mut headers = Vec::new();
        let mut values = Vec::new();
        for group in output.groups {
            headers.extend(group.headers);
            values.extend(group.values);
        }
        Self {
            headers,
            values,
            date: output.max_date,
            sources: Vec::new(),
            audit: output.audit,
        }
    }
}

/// One dataset pass: a schema, a shared resolver and a row source.
pub struct DatasetJob<'r, 'a> {
    schema: RowSchema,
    resolver: &'r AdminResolver<'a>,
    rows: RowSource,
    citation: Option<(String, Option<String>)>,
}

impl<'r, 'a> DatasetJob<'r, 'a> {
    pub fn new(schema: RowSchema, resolver: &'r AdminResolver<'a>, rows: RowSource) -> Self {
        Self {
            schema,
            resolver,
            rows,
            citation: None,
        }
    }

    /// Cites `source` for every header of the live output.
    #[must_use]
    pub fn with_citation(mut self, source: impl Into<String>, url: Option<String>) -> Self {
        self.citation = Some((source.into(), url));
        self
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn level(&self) -> OutputLevel {
        self.schema.output_level()
    }

    /// Headers of every group, in group order.
    pub fn shape(&self) -> OutputShape {
        let admin_column = self
            .schema
            .admin_columns
            .last()
            .map_or(GLOBAL_KEY, String::as_str);
        OutputShape::new(
            admin_column,
            self.schema
                .groups
                .iter()
                .flat_map(IndicatorGroup::output_headers),
        )
    }

    /// Loads the rows and aggregates them.
    pub fn run(&self) -> Result<SourceOutput> {
        let rows: Cow<'_, [Row]> = match &self.rows {
            RowSource::Rows(rows) => Cow::Borrowed(rows.as_slice()),
            RowSource::Csv(path) => {
                let df = read_csv_frame(path)
                    .with_context(|| format!("read {}", path.display()))?;
                Cow::Owned(rows_from_frame(&df))
            }
        };
        let output = RowAggregator::process(&self.schema, self.resolver, rows.iter())
            .with_context(|| format!("aggregate dataset {}", self.schema.name))?;

        let mut output = SourceOutput::from(output);
        if let Some((source, url)) = &self.citation {
            output.sources = output
                .headers
                .iter()
                .map(|header| SourceCitation {
                    indicator: header.clone(),
                    date: output.date,
                    source: source.clone(),
                    url: url.clone(),
                })
                .collect();
        }
        Ok(output)
    }

    /// Queues this job on `coordinator`.
    pub fn register<'w>(self, coordinator: &mut RunCoordinator<'w>)
    where
        'r: 'w,
        'a: 'w,
    {
        let name = self.name().to_string();
        let level = self.level();
        let shape = self.shape();
        coordinator.register(name, level, shape, move || self.run());
    }
}

/// Runs every dataset of `config`, or only those named in `only`.
///
/// Datasets run in name order. Setup failures (reference data, resolver,
/// fallback directory) are returned; dataset failures never are.
pub fn run_configured(config: &RunConfig, only: &[String]) -> Result<RunReport> {
    let index = config.build_index()?;
    let resolver =
        AdminResolver::new(&index, config.resolver.clone()).context("build admin resolver")?;
    let store = config.fallback_store()?;

    let mut coordinator = RunCoordinator::new(store);
    if !only.is_empty() {
        coordinator = coordinator.with_only(only.iter().cloned());
    }
    for dataset in config.datasets.values() {
        let mut job = DatasetJob::new(
            dataset.schema.clone(),
            &resolver,
            RowSource::Csv(dataset.path.clone()),
        );
        if let Some(source) = &dataset.source {
            job = job.with_citation(source.clone(), dataset.url.clone());
        }
        job.register(&mut coordinator);
    }

    let report = coordinator.run();
    info!(
        datasets = report.outputs.len(),
        degraded = ?report.degraded,
        "configured run complete"
    );
    Ok(report)
}
