//! # 分块调度模块
//!
//! 把输出图像划分为互不重叠的 16x16 分块 (最后一列/一行按剩余像素裁剪)，
//! 每个分块作为一个独立任务交给 `rayon` 线程池并行执行，全部完成后才返回。
//!
//! 每个任务只持有自己分块内各行的可变切片，因此不同任务之间没有共享的可变状态，
//! 也不需要任何锁。任务内部的 panic 会被捕获并转换为 [`StegoError::BlockFailed`]，
//! 整个运行随之失败，而不是无限等待一个永远不会到来的完成信号。

use crate::constants::BLOCK_SIZE;
use crate::error::StegoError;
use crate::steganography::{BitDepth, embed_pixel, reveal_pixel};
use image::{Rgba, RgbaImage};
use log::{debug, error, info};
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const CHANNELS: usize = 4;

/// 输出图像中的一个矩形分块。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

impl Block {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// 计算覆盖 `width x height` 的分块网格，按行优先顺序返回。
///
/// 网格大小为 `ceil(width / block_size) x ceil(height / block_size)`，
/// 最后一列的宽度为 `width - x0`，最后一行的高度为 `height - y0`。
/// 宽或高为 0 时返回空网格。
///
/// # Errors
///
/// `block_size` 为 0 时返回 [`StegoError::InvalidBlockSize`]。
pub fn block_grid(width: u32, height: u32, block_size: u32) -> Result<Vec<Block>, StegoError> {
    if block_size == 0 {
        return Err(StegoError::InvalidBlockSize);
    }

    let x_blocks = width.div_ceil(block_size);
    let y_blocks = height.div_ceil(block_size);

    let blocks = (0..y_blocks)
        .flat_map(|j| (0..x_blocks).map(move |i| (i, j)))
        .map(|(i, j)| {
            let x0 = i * block_size;
            let y0 = j * block_size;
            Block {
                x0,
                y0,
                width: block_size.min(width - x0),
                height: block_size.min(height - y0),
            }
        })
        .collect();

    Ok(blocks)
}

/// 一次运行的输入：嵌入需要载体和隐藏图像，揭示只需要一张图像。
#[derive(Debug, Clone, Copy)]
pub enum Job<'a> {
    Embed {
        carrier: &'a RgbaImage,
        hidden: &'a RgbaImage,
    },
    Reveal {
        image: &'a RgbaImage,
    },
}

impl Job<'_> {
    /// 决定输出尺寸的图像。
    pub fn source(&self) -> &RgbaImage {
        match self {
            Job::Embed { carrier, .. } => *carrier,
            Job::Reveal { image } => *image,
        }
    }

    /// 嵌入时两张图像必须逐像素对齐。
    pub fn validate(&self) -> Result<(), StegoError> {
        if let Job::Embed { carrier, hidden } = self {
            if carrier.dimensions() != hidden.dimensions() {
                return Err(StegoError::DimensionMismatch {
                    carrier_w: carrier.width(),
                    carrier_h: carrier.height(),
                    hidden_w: hidden.width(),
                    hidden_h: hidden.height(),
                });
            }
        }
        Ok(())
    }

    fn pixel(&self, x: u32, y: u32, depth: BitDepth) -> Rgba<u8> {
        match self {
            Job::Embed { carrier, hidden } => {
                embed_pixel(*carrier.get_pixel(x, y), *hidden.get_pixel(x, y), depth)
            }
            Job::Reveal { image } => reveal_pixel(*image.get_pixel(x, y), depth),
        }
    }
}

/// 并行阶段的统计信息。
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub blocks: usize,
    pub threads: usize,
    pub elapsed: Duration,
}

/// 分块调度器。
///
/// `threads` 为 0 时线程池大小取硬件并发数。
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    threads: usize,
    block_size: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            threads: 0,
            block_size: BLOCK_SIZE,
        }
    }
}

/// 一个分块任务：分块本身以及它在输出缓冲区中独占的各行切片。
struct BlockTask<'buf> {
    block: Block,
    rows: Vec<&'buf mut [u8]>,
}

impl BlockTask<'_> {
    fn fill<F>(self, pixel_at: &F)
    where
        F: Fn(u32, u32) -> Rgba<u8>,
    {
        let Block { x0, y0, .. } = self.block;
        for (y, row) in (y0..).zip(self.rows) {
            for (x, px) in (x0..).zip(row.chunks_exact_mut(CHANNELS)) {
                px.copy_from_slice(&pixel_at(x, y).0);
            }
        }
    }
}

impl Scheduler {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// 对整张图像执行嵌入或揭示，返回新分配的、完全不透明的输出图像。
    ///
    /// # Errors
    ///
    /// * 嵌入时两张图像尺寸不同。
    /// * 线程池无法创建。
    /// * 任意分块任务失败，或完成数量与启动数量不一致。
    pub fn run(
        &self,
        job: Job<'_>,
        depth: BitDepth,
    ) -> Result<(RgbaImage, RunReport), StegoError> {
        job.validate()?;
        let (width, height) = job.source().dimensions();
        self.render(width, height, |x, y| job.pixel(x, y, depth))
    }

    /// 用 `pixel_at(x, y)` 生成 `width x height` 图像的每一个像素，按分块并行。
    ///
    /// 每个像素恰好由一个分块任务写入一次。
    pub fn render<F>(
        &self,
        width: u32,
        height: u32,
        pixel_at: F,
    ) -> Result<(RgbaImage, RunReport), StegoError>
    where
        F: Fn(u32, u32) -> Rgba<u8> + Sync,
    {
        let blocks = block_grid(width, height, self.block_size())?;
        let mut output = RgbaImage::new(width, height);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads())
            .build()?;
        let threads = pool.current_num_threads();

        debug!(
            "{}x{} image split into {} blocks of {}px, {} worker threads (requested {})",
            width,
            height,
            blocks.len(),
            self.block_size(),
            threads,
            self.threads()
        );

        let spawned = blocks.len();
        let completed = AtomicUsize::new(0);
        let start = Instant::now();

        if spawned > 0 {
            let tasks = split_into_tasks(&mut output, &blocks, self.block_size());
            debug_assert_eq!(tasks.len(), spawned);

            pool.install(|| {
                tasks.into_par_iter().try_for_each(|task| {
                    let Block { x0, y0, .. } = task.block;
                    panic::catch_unwind(AssertUnwindSafe(|| task.fill(&pixel_at))).map_err(
                        |payload| {
                            let reason = panic_reason(payload.as_ref());
                            error!("block task at ({}, {}) panicked: {}", x0, y0, reason);
                            StegoError::BlockFailed { x0, y0, reason }
                        },
                    )?;
                    completed.fetch_add(1, Ordering::Relaxed);
                    Ok::<(), StegoError>(())
                })
            })?;
        }

        // 兜底检查：失败的任务已在上面以 BlockFailed 返回，这里只防止任务被静默丢弃
        let completed = completed.into_inner();
        if completed != spawned {
            return Err(StegoError::IncompleteJoin { completed, spawned });
        }

        let elapsed = start.elapsed();
        info!(
            "{} blocks finished in {:.3}ms",
            spawned,
            elapsed.as_secs_f64() * 1000.0
        );

        Ok((
            output,
            RunReport {
                blocks: spawned,
                threads,
                elapsed,
            },
        ))
    }
}

/// 把输出缓冲区拆成各分块独占的行切片。
///
/// 缓冲区先按 `block_size` 行切成水平条带，条带中的每一行再按 `block_size` 像素切段，
/// 同一列的各段归属同一个分块。`blocks` 必须是 [`block_grid`] 按行优先生成的网格。
fn split_into_tasks<'buf>(
    output: &'buf mut RgbaImage,
    blocks: &[Block],
    block_size: u32,
) -> Vec<BlockTask<'buf>> {
    let width = output.width() as usize;
    let row_bytes = width * CHANNELS;
    let band_bytes = row_bytes * block_size as usize;
    let segment_bytes = block_size as usize * CHANNELS;
    let x_blocks = width.div_ceil(block_size as usize);

    let mut tasks = Vec::with_capacity(blocks.len());
    let buffer: &mut [u8] = output;

    for (band, band_rows) in buffer.chunks_mut(band_bytes).enumerate() {
        let mut columns: Vec<Vec<&mut [u8]>> = (0..x_blocks).map(|_| Vec::new()).collect();
        for row in band_rows.chunks_mut(row_bytes) {
            for (column, segment) in columns.iter_mut().zip(row.chunks_mut(segment_bytes)) {
                column.push(segment);
            }
        }

        let band_blocks = &blocks[band * x_blocks..(band + 1) * x_blocks];
        tasks.extend(
            band_blocks
                .iter()
                .zip(columns)
                .map(|(&block, rows)| BlockTask { block, rows }),
        );
    }

    tasks
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
