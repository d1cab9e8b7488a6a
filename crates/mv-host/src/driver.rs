//! Bounded parallel execution of view instances on the tokio blocking pool.
//!
//! Sequential views run on a single blocking task. Parallel views get one task per
//! partition, gated by a semaphore; partial contexts are merged in the order the
//! tasks finish. Under an aborting failure no further partition is started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mv_kernel::{
    ExecError, ExecReport, PartialContext, PartitionFailure, PartitionRun, ViewInstance,
    ViewRegistry, collect_partitions, partition_records, run_sequential,
};
use mv_view_types::{CallArg, ViewType};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::HostConfig;
use crate::error::HostError;

#[derive(Debug, Clone)]
pub struct ParallelDriver {
    config: HostConfig,
    permits: Arc<Semaphore>,
}

impl ParallelDriver {
    pub fn new(config: HostConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self { config, permits }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Run `instance` over `records`, honoring its sequential flag.
    pub async fn run(
        &self,
        instance: &ViewInstance,
        records: Vec<Value>,
    ) -> Result<ExecReport, HostError> {
        let span = tracing::info_span!(
            "view.run",
            view = instance.name(),
            instance = %instance.instance_id(),
            records = records.len(),
        );
        self.execute(instance.clone(), records)
            .instrument(span)
            .await
    }

    /// Look `name` up in `registry`, bind `args` and run it.
    pub async fn run_named<I, A>(
        &self,
        registry: &ViewRegistry,
        name: &str,
        args: I,
        records: Vec<Value>,
    ) -> Result<ExecReport, HostError>
    where
        I: IntoIterator<Item = A>,
        A: Into<CallArg>,
    {
        let instance = registry.get(name)?.call(args)?;
        self.run(&instance, records).await
    }

    async fn execute(
        &self,
        instance: ViewInstance,
        records: Vec<Value>,
    ) -> Result<ExecReport, HostError> {
        if instance.options().sequential {
            let report =
                tokio::task::spawn_blocking(move || run_sequential(&instance, records)).await??;
            return Ok(report);
        }
        self.run_partitioned(instance, records).await
    }

    async fn run_partitioned(
        &self,
        instance: ViewInstance,
        records: Vec<Value>,
    ) -> Result<ExecReport, HostError> {
        let policy = self.config.on_partition_failure;
        let abort = policy == PartitionFailure::Abort || instance.view_type() == ViewType::Record;
        let partitions = partition_records(records, self.config.partition_size);
        tracing::debug!(partitions = partitions.len(), "spawning partitions");

        // Set by the failing task itself, before its permit is released, so no
        // partition started after an aborting failure reaches `each`.
        let halted = Arc::new(AtomicBool::new(false));
        let mut pending = partitions.into_iter().peekable();
        let mut tasks: JoinSet<Option<Result<PartialContext, ExecError>>> = JoinSet::new();
        let mut outcomes = Vec::new();
        loop {
            let spawn_more = !halted.load(Ordering::SeqCst) && pending.peek().is_some();
            if !spawn_more && tasks.is_empty() {
                break;
            }
            tokio::select! {
                biased;
                Some(joined) = tasks.join_next() => {
                    let Some(outcome) = joined? else { continue };
                    if let Err(err) = &outcome {
                        tracing::warn!(error = %err, "partition failed");
                        if abort {
                            outcomes.push(outcome);
                            break;
                        }
                    }
                    outcomes.push(outcome);
                }
                permit = Arc::clone(&self.permits).acquire_owned(), if spawn_more => {
                    let permit = permit.map_err(|_| HostError::Closed)?;
                    let Some(partition) = pending.next() else { continue };
                    let instance = instance.clone();
                    let halted = Arc::clone(&halted);
                    tasks.spawn_blocking(move || {
                        let _permit = permit;
                        if halted.load(Ordering::SeqCst) {
                            return None;
                        }
                        let outcome = PartitionRun::new(&instance).run(partition);
                        if abort && outcome.is_err() {
                            halted.store(true, Ordering::SeqCst);
                        }
                        Some(outcome)
                    });
                }
                else => break,
            }
        }
        // Dropping the set cancels queued tasks; running ones finish their partition.
        drop(tasks);
        Ok(collect_partitions(&instance, outcomes, policy)?)
    }
}

impl Default for ParallelDriver {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
