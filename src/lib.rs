//! # lsb_mix 库
//!
//! 本库包含图像 LSB 混合工具的核心逻辑：逐像素的嵌入/揭示变换，
//! 以及把图像切分为分块并行处理的调度器。

// 声明库包含的所有模块。

pub mod cli;
pub mod constants;
pub mod error;
pub mod handler;
pub mod steganography;
pub mod tiling;
