//! # 错误类型模块
//!
//! 核心库 (分块与像素变换) 的错误。命令行层在此之上使用 `anyhow` 附加上下文。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StegoError {
    #[error("image dimensions differ: carrier is {carrier_w}x{carrier_h}, hidden is {hidden_w}x{hidden_h}")]
    DimensionMismatch {
        carrier_w: u32,
        carrier_h: u32,
        hidden_w: u32,
        hidden_h: u32,
    },

    #[error("block size must be greater than zero")]
    InvalidBlockSize,

    #[error("the task for the block at ({x0}, {y0}) failed: {reason}")]
    BlockFailed { x0: u32, y0: u32, reason: String },

    #[error("only {completed} of {spawned} block tasks reported completion")]
    IncompleteJoin { completed: usize, spawned: usize },

    #[error("unable to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
