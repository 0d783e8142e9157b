use thiserror::Error;

/// 引擎与存储层错误
#[derive(Debug, Error)]
pub enum RewardError {
    #[error("negative reward amount: {0} micros")]
    NegativeAmount(i64),

    #[error("reward counter overflow")]
    Overflow,

    #[error("offer slot {0} out of range")]
    InvalidSlot(usize),

    #[error("invalid reward config")]
    InvalidConfig,

    #[error("reward ledger is not running")]
    LedgerClosed,

    #[error("storage error: {0}")]
    Storage(#[from] duckdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 宿主协作方 (广告 SDK / 导航 / 远端接口) 的失败
///
/// 这些错误在调用点被记录并吞掉，不会回滚已经发生的记账。
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator not registered")]
    Unavailable,

    #[error("host callback returned {0}")]
    Host(i32),

    #[error("url contains an interior NUL byte")]
    InvalidUrl,

    #[error("remote call failed: {0}")]
    Remote(String),
}

pub type RewardResult<T> = Result<T, RewardError>;
