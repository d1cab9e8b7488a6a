//! Execution model for view instances.
//!
//! A run moves `NotStarted -> Pre -> Iterating -> Post -> Done`, skipping `Pre` and
//! `Post` when the view has no such callback.
//!
//! Sequential views thread one context through every record in input order.
//! Parallel views split the records into partitions; each partition gets its own
//! `pre` context, and `post` receives the partial contexts in completion order, so
//! `post` has to be associative and commutative over that list. Record views never
//! see `pre`/`post`; their output keeps the input order whatever the partitioning.

use std::fmt;

use mv_view_types::{CallbackError, PostInput, Step, ViewType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::view::ViewInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewPhase {
    NotStarted,
    Pre,
    Iterating,
    Post,
    Done,
}

impl fmt::Display for ViewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewPhase::NotStarted => "not started",
            ViewPhase::Pre => "pre",
            ViewPhase::Iterating => "each",
            ViewPhase::Post => "post",
            ViewPhase::Done => "done",
        })
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{phase} failed for model view {view}: {source}")]
    Callback {
        view: String,
        phase: ViewPhase,
        partition: Option<usize>,
        #[source]
        source: CallbackError,
    },
    #[error("model view {view} run is {found:?}, expected {expected:?}")]
    Phase {
        view: String,
        expected: ViewPhase,
        found: ViewPhase,
    },
    #[error("model view {view} run was aborted by an earlier failure")]
    Aborted { view: String },
    #[error("all {failed} partitions of model view {view} failed")]
    AllPartitionsFailed { view: String, failed: usize },
}

impl ExecError {
    fn in_partition(self, ordinal: usize) -> Self {
        match self {
            ExecError::Callback {
                view,
                phase,
                source,
                ..
            } => ExecError::Callback {
                view,
                phase,
                partition: Some(ordinal),
                source,
            },
            other => other,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutput {
    /// Result of a collection view.
    Aggregate(Value),
    /// Transformed records of a record view, in input order.
    Records(Vec<Value>),
}

fn empty_context() -> Value {
    Value::Object(Map::new())
}

/// One context threaded through records in order.
///
/// Used for a whole sequential run, and for the records of a single partition.
pub struct SequentialRun<'a> {
    instance: &'a ViewInstance,
    phase: ViewPhase,
    context: Value,
    next_index: usize,
    failed: bool,
}

impl<'a> SequentialRun<'a> {
    pub fn new(instance: &'a ViewInstance) -> Self {
        Self {
            instance,
            phase: ViewPhase::NotStarted,
            context: empty_context(),
            next_index: 0,
            failed: false,
        }
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Run `pre` if present and start iterating.
    pub fn begin(&mut self) -> Result<(), ExecError> {
        self.ensure_phase(ViewPhase::NotStarted)?;
        let instance = self.instance;
        if let Some(pre) = instance.pre() {
            self.phase = ViewPhase::Pre;
            let context = pre
                .call_pre(instance.args_value())
                .map_err(|source| self.fail(source))?;
            self.context = context;
        }
        self.phase = ViewPhase::Iterating;
        Ok(())
    }

    /// Feed the next record; its index is one past the previous record's.
    pub fn feed(&mut self, record: &mut Value) -> Result<(), ExecError> {
        let index = self.next_index;
        self.feed_at(index, record)
    }

    /// Feed a record carrying its position in the full input sequence.
    pub fn feed_at(&mut self, index: usize, record: &mut Value) -> Result<(), ExecError> {
        self.ensure_phase(ViewPhase::Iterating)?;
        let instance = self.instance;
        let mut step = Step {
            args: instance.args_value(),
            record,
            index,
            context: &mut self.context,
        };
        if let Err(source) = instance.each().call_each(&mut step) {
            return Err(self.fail(source));
        }
        self.next_index = index + 1;
        Ok(())
    }

    /// Run `post` over the single context, or return the context itself.
    pub fn finish(mut self) -> Result<Value, ExecError> {
        self.ensure_phase(ViewPhase::Iterating)?;
        let instance = self.instance;
        let context = std::mem::replace(&mut self.context, Value::Null);
        let result = match instance.post() {
            Some(post) => {
                self.phase = ViewPhase::Post;
                post.call_post(instance.args_value(), PostInput::Context(context))
                    .map_err(|source| self.fail(source))?
            }
            None => context,
        };
        self.phase = ViewPhase::Done;
        Ok(result)
    }

    /// End iteration without running `post`, yielding the partial context.
    pub fn into_context(mut self) -> Result<Value, ExecError> {
        self.ensure_phase(ViewPhase::Iterating)?;
        self.phase = ViewPhase::Done;
        Ok(std::mem::replace(&mut self.context, Value::Null))
    }

    fn ensure_phase(&self, expected: ViewPhase) -> Result<(), ExecError> {
        if self.failed {
            return Err(ExecError::Aborted {
                view: self.instance.name().to_string(),
            });
        }
        if self.phase != expected {
            return Err(ExecError::Phase {
                view: self.instance.name().to_string(),
                expected,
                found: self.phase,
            });
        }
        Ok(())
    }

    fn fail(&mut self, source: CallbackError) -> ExecError {
        self.failed = true;
        ExecError::Callback {
            view: self.instance.name().to_string(),
            phase: self.phase,
            partition: None,
            source,
        }
    }
}

/// A slice of the input processed independently of the others.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub ordinal: usize,
    /// Records paired with their index in the full input sequence.
    pub records: Vec<(usize, Value)>,
}

/// Split records into contiguous partitions of at most `size` records.
///
/// Always yields at least one partition so that `pre` and `post` run even for an
/// empty input.
pub fn partition_records(records: Vec<Value>, size: usize) -> Vec<Partition> {
    let size = size.max(1);
    let mut partitions: Vec<Partition> = Vec::with_capacity(records.len() / size + 1);
    for (index, record) in records.into_iter().enumerate() {
        match partitions.last_mut() {
            Some(partition) if partition.records.len() < size => {
                partition.records.push((index, record))
            }
            _ => partitions.push(Partition {
                ordinal: partitions.len(),
                records: vec![(index, record)],
            }),
        }
    }
    if partitions.is_empty() {
        partitions.push(Partition {
            ordinal: 0,
            records: Vec::new(),
        });
    }
    partitions
}

/// Context and records left by a partition that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialContext {
    pub ordinal: usize,
    pub context: Value,
    pub records: Vec<(usize, Value)>,
}

/// Runs `pre` and `each` over one partition.
///
/// A failing partition yields an error and no context, so a malformed context can
/// never reach `post`.
pub struct PartitionRun<'a> {
    instance: &'a ViewInstance,
}

impl<'a> PartitionRun<'a> {
    pub fn new(instance: &'a ViewInstance) -> Self {
        Self { instance }
    }

    pub fn run(&self, partition: Partition) -> Result<PartialContext, ExecError> {
        let Partition {
            ordinal,
            mut records,
        } = partition;
        let mut run = SequentialRun::new(self.instance);
        run.begin().map_err(|err| err.in_partition(ordinal))?;
        for (index, record) in records.iter_mut() {
            run.feed_at(*index, record)
                .map_err(|err| err.in_partition(ordinal))?;
        }
        let context = run.into_context()?;
        Ok(PartialContext {
            ordinal,
            context,
            records,
        })
    }
}

/// Reduce partial contexts with `post`; without `post` the contexts are returned
/// as a JSON array.
pub fn merge_partials(
    instance: &ViewInstance,
    partials: Vec<PartialContext>,
) -> Result<Value, ExecError> {
    let contexts: Vec<Value> = partials.into_iter().map(|p| p.context).collect();
    match instance.post() {
        Some(post) => post
            .call_post(
                instance.args_value(),
                PostInput::Partials(contexts),
            )
            .map_err(|source| ExecError::Callback {
                view: instance.name().to_string(),
                phase: ViewPhase::Post,
                partition: None,
                source,
            }),
        None => Ok(Value::Array(contexts)),
    }
}

/// Put partitioned record-view output back into input order.
fn stitch_records(partials: Vec<PartialContext>) -> Vec<Value> {
    let mut indexed: Vec<(usize, Value)> =
        partials.into_iter().flat_map(|p| p.records).collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, record)| record).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionOrder {
    /// Process partitions front to back.
    #[default]
    Input,
    /// Process partitions back to front.
    Reverse,
}

/// What happens to a parallel collection run when one partition fails.
///
/// Record views always abort: their output is the record sequence itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionFailure {
    #[default]
    Abort,
    /// Merge the partitions that succeeded.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecOptions {
    pub partition_size: usize,
    pub partition_order: PartitionOrder,
    pub on_partition_failure: PartitionFailure,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            partition_size: 256,
            partition_order: PartitionOrder::Input,
            on_partition_failure: PartitionFailure::Abort,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecReport {
    pub output: ViewOutput,
    pub partitions: usize,
    /// Ordinals of partitions dropped under [`PartitionFailure::Skip`].
    pub failed_partitions: Vec<usize>,
}

/// Fold per-partition outcomes, listed in completion order, into a report.
pub fn collect_partitions(
    instance: &ViewInstance,
    outcomes: Vec<Result<PartialContext, ExecError>>,
    policy: PartitionFailure,
) -> Result<ExecReport, ExecError> {
    let partitions = outcomes.len();
    let skip = policy == PartitionFailure::Skip && instance.view_type() == ViewType::Collection;
    let mut completed = Vec::with_capacity(partitions);
    let mut failed_partitions = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(partial) => completed.push(partial),
            Err(err) if skip => {
                log::warn!("dropping partition of model view {}: {err}", instance.name());
                if let ExecError::Callback {
                    partition: Some(ordinal),
                    ..
                } = err
                {
                    failed_partitions.push(ordinal);
                }
            }
            Err(err) => return Err(err),
        }
    }
    if completed.is_empty() && partitions > 0 {
        return Err(ExecError::AllPartitionsFailed {
            view: instance.name().to_string(),
            failed: partitions,
        });
    }
    failed_partitions.sort_unstable();
    let output = match instance.view_type() {
        ViewType::Collection => ViewOutput::Aggregate(merge_partials(instance, completed)?),
        ViewType::Record => ViewOutput::Records(stitch_records(completed)),
    };
    Ok(ExecReport {
        output,
        partitions,
        failed_partitions,
    })
}

/// In-thread driver: runs a view instance over a fully materialized record list.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    options: ExecOptions,
}

impl Executor {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    pub fn run(&self, instance: &ViewInstance, records: Vec<Value>) -> Result<ExecReport, ExecError> {
        log::debug!(
            "running model view {} ({}) over {} records",
            instance.name(),
            instance.instance_id().short(),
            records.len()
        );
        if instance.options().sequential {
            run_sequential(instance, records)
        } else {
            self.run_partitioned(instance, records)
        }
    }

    fn run_partitioned(
        &self,
        instance: &ViewInstance,
        records: Vec<Value>,
    ) -> Result<ExecReport, ExecError> {
        let mut partitions = partition_records(records, self.options.partition_size);
        if self.options.partition_order == PartitionOrder::Reverse {
            partitions.reverse();
        }
        let abort = self.options.on_partition_failure == PartitionFailure::Abort
            || instance.view_type() == ViewType::Record;
        let runner = PartitionRun::new(instance);
        let mut outcomes = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let outcome = runner.run(partition);
            let failed = outcome.is_err();
            outcomes.push(outcome);
            if failed && abort {
                break;
            }
        }
        collect_partitions(instance, outcomes, self.options.on_partition_failure)
    }
}

/// Run a sequential view over all records with one context.
pub fn run_sequential(
    instance: &ViewInstance,
    mut records: Vec<Value>,
) -> Result<ExecReport, ExecError> {
    let mut run = SequentialRun::new(instance);
    run.begin()?;
    for record in records.iter_mut() {
        run.feed(record)?;
    }
    let output = match instance.view_type() {
        ViewType::Collection => ViewOutput::Aggregate(run.finish()?),
        ViewType::Record => {
            run.into_context()?;
            ViewOutput::Records(records)
        }
    };
    Ok(ExecReport {
        output,
        partitions: 1,
        failed_partitions: Vec::new(),
    })
}
