use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("view error: {0}")]
    View(#[from] mv_kernel::ViewError),
    #[error("execution error: {0}")]
    Exec(#[from] mv_kernel::ExecError),
    #[error("partition task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("driver is shut down")]
    Closed,
    #[error("invalid host config: {0}")]
    Config(String),
}
