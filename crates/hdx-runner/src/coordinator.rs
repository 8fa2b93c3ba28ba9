//! Fallback-guarded execution of data sources.
//!
//! [`RunCoordinator`] is the one place where failures stop. A unit of work
//! that returns an error or panics is logged, its source is marked degraded
//! and the fallback snapshot for its level is served in its place, reshaped
//! to the same [`OutputShape`] a live result would have had.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use chrono::NaiveDate;
use hdx_aggregate::OutputValue;
use hdx_model::{AuditBundle, OutputLevel};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::fallback::{FallbackSnapshot, FallbackStore, SourceCitation};

/// Result of one source, live or substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceOutput {
    pub headers: Vec<String>,
    /// One admin code → value map per header.
    pub values: Vec<BTreeMap<String, OutputValue>>,
    pub date: Option<NaiveDate>,
    pub sources: Vec<SourceCitation>,
    pub audit: AuditBundle,
}

impl SourceOutput {
    pub fn value(&self, header: &str, admin: &str) -> Option<&OutputValue> {
        let idx = self.headers.iter().position(|h| h == header)?;
        self.values.get(idx)?.get(admin)
    }
}

/// Declared header layout of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputShape {
    pub admin_column: String,
    pub headers: Vec<String>,
}

impl OutputShape {
    pub fn new<S: Into<String>>(
        admin_column: impl Into<String>,
        headers: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            admin_column: admin_column.into(),
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Every header present, every map empty.
    pub fn empty(&self) -> SourceOutput {
        SourceOutput {
            headers: self.headers.clone(),
            values: vec![BTreeMap::new(); self.headers.len()],
            ..SourceOutput::default()
        }
    }

    /// Reorders `output` to this shape. Missing headers get empty maps and
    /// headers outside the shape are dropped.
    pub fn conform(&self, source: &str, mut output: SourceOutput) -> SourceOutput {
        let mut by_header: BTreeMap<String, BTreeMap<String, OutputValue>> = BTreeMap::new();
        for (header, values) in output.headers.drain(..).zip(output.values.drain(..)) {
            by_header.entry(header).or_insert(values);
        }

        let values = self
            .headers
            .iter()
            .map(|header| {
                by_header.remove(header).unwrap_or_else(|| {
                    debug!(source, header = %header, "declared header missing from output");
                    BTreeMap::new()
                })
            })
            .collect();
        for header in by_header.keys() {
            warn!(source, header = %header, "dropping column outside the declared shape");
        }

        SourceOutput {
            headers: self.headers.clone(),
            values,
            ..output
        }
    }

    /// Rebuilds a result from a persisted snapshot.
    ///
    /// Rows without an admin code are skipped, as are blank cells. Citations
    /// are kept for the headers of this shape only.
    pub fn from_snapshot(&self, snapshot: &FallbackSnapshot) -> SourceOutput {
        let mut output = self.empty();
        for row in &snapshot.rows {
            let Some(admin) = row
                .get(&snapshot.admin_column)
                .map(|value| value.to_text().trim().to_string())
                .filter(|admin| !admin.is_empty())
            else {
                continue;
            };
            for (header, values) in self.headers.iter().zip(&mut output.values) {
                if let Some(value) = row.get(header).filter(|value| !value.is_null()) {
                    values.insert(admin.clone(), OutputValue::Single(value.clone()));
                }
            }
        }
        output.sources = snapshot
            .sources
            .iter()
            .filter(|citation| self.headers.contains(&citation.indicator))
            .cloned()
            .collect();
        output.date = output.sources.iter().filter_map(|c| c.date).max();
        output
    }
}

/// Outcome of a named source within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedOutput {
    pub name: String,
    pub level: OutputLevel,
    pub output: SourceOutput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Outputs in registration order.
    pub outputs: Vec<NamedOutput>,
    /// Sources served from fallback.
    pub degraded: Vec<String>,
    /// Merged audit of every live source.
    pub audit: AuditBundle,
}

impl RunReport {
    pub fn output(&self, name: &str) -> Option<&SourceOutput> {
        self.outputs
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.output)
    }

    pub fn is_degraded(&self, name: &str) -> bool {
        self.degraded.iter().any(|degraded| degraded == name)
    }
}

type UnitOfWork<'w> = Box<dyn FnOnce() -> Result<SourceOutput> + 'w>;

struct RegisteredSource<'w> {
    name: String,
    level: OutputLevel,
    shape: OutputShape,
    work: UnitOfWork<'w>,
}

/// Runs sources one after another, substituting fallbacks for failures.
pub struct RunCoordinator<'w> {
    store: FallbackStore,
    sources: Vec<RegisteredSource<'w>>,
    only: Option<BTreeSet<String>>,
    degraded: Vec<String>,
}

impl<'w> RunCoordinator<'w> {
    pub fn new(store: FallbackStore) -> Self {
        Self {
            store,
            sources: Vec::new(),
            only: None,
            degraded: Vec::new(),
        }
    }

    /// Restricts [`run`](Self::run) to the named sources.
    #[must_use]
    pub fn with_only<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn should_run(&self, name: &str) -> bool {
        self.only.as_ref().is_none_or(|only| only.contains(name))
    }

    /// Queues a unit of work for [`run`](Self::run).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        level: OutputLevel,
        shape: OutputShape,
        work: impl FnOnce() -> Result<SourceOutput> + 'w,
    ) {
        self.sources.push(RegisteredSource {
            name: name.into(),
            level,
            shape,
            work: Box::new(work),
        });
    }

    /// Sources degraded so far in this run.
    pub fn degraded(&self) -> &[String] {
        &self.degraded
    }

    /// Executes `work`, or serves the fallback for `level` when it fails.
    ///
    /// Never returns the failure itself: the caller always receives an output
    /// with exactly the headers of `shape`, and learns about the failure
    /// only through [`degraded`](Self::degraded).
    pub fn run_with_fallback<F>(
        &mut self,
        name: &str,
        level: OutputLevel,
        shape: &OutputShape,
        work: F,
    ) -> SourceOutput
    where
        F: FnOnce() -> Result<SourceOutput>,
    {
        let span = info_span!("source", source = name, level = %level);
        let _guard = span.enter();

        let failure = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(output)) => {
                info!("source completed");
                return shape.conform(name, output);
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        error!(error = %failure, "source failed, serving fallback");
        self.degraded.push(name.to_string());
        match self.store.snapshot(level) {
            Some(snapshot) => shape.from_snapshot(snapshot),
            None => {
                warn!("no fallback snapshot for this level");
                shape.empty()
            }
        }
    }

    /// Runs every registered source allowed by the `only` filter.
    pub fn run(mut self) -> RunReport {
        let mut outputs = Vec::new();
        let mut audit = AuditBundle::new();
        for source in std::mem::take(&mut self.sources) {
            if !self.should_run(&source.name) {
                debug!(source = %source.name, "skipped by source filter");
                continue;
            }
            let mut output =
                self.run_with_fallback(&source.name, source.level, &source.shape, source.work);
            audit.merge(std::mem::take(&mut output.audit));
            outputs.push(NamedOutput {
                name: source.name,
                level: source.level,
                output,
            });
        }

        audit.log_summary();
        info!(
            sources = outputs.len(),
            degraded = self.degraded.len(),
            "run finished"
        );
        RunReport {
            outputs,
            degraded: self.degraded,
            audit,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
