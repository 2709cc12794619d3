use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("pool error: {0}")]
    Pool(#[from] tide_pool::PoolError),

    #[error("wrapper error: {0}")]
    Rebase(#[from] tide_rebase::RebaseError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] tide_pool::SnapshotError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
