//! View kernel: registry, definition construction, instance factory and the
//! in-thread execution drivers for sequential and partitioned views.

pub mod error;
pub mod exec;
pub mod registry;
pub mod view;
pub mod wrap;

mod define;

pub use error::ViewError;
pub use exec::{
    ExecError, ExecOptions, ExecReport, Executor, PartialContext, Partition, PartitionFailure,
    PartitionOrder, PartitionRun, SequentialRun, ViewOutput, ViewPhase, collect_partitions,
    merge_partials, partition_records, run_sequential,
};
pub use registry::ViewRegistry;
pub use view::{DefView, ViewInstance};
pub use wrap::{CallbackWrapper, ImmutableWrapper, WrapError, WrapOptions, qualified_name};

pub use mv_view_types::{each_fn, post_fn, pre_fn};

#[cfg(test)]
mod tests;
