//! # 命令处理逻辑模块
//!
//! 负责协调文件 I/O、调用分块调度器以及向用户报告结果。
//! 所有错误都在边界处 (打开、解码、编码) 检测，并立即终止本次运行。

use crate::cli::Invocation;
use crate::steganography::Mode;
use crate::tiling::{Job, Scheduler};
use anyhow::{Context, Result};
use colored::Colorize;
use image::{ImageFormat, ImageReader, RgbaImage};
use log::debug;
use std::path::Path;

/// 打开并解码一张图像，转换为 8 位 RGBA。
///
/// 打开失败与解码失败会给出不同的错误信息。
///
/// # Errors
///
/// * 文件不存在或不可读。
/// * 文件内容不是可识别的图像。
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .with_context(|| {
            format!(
                "Unable to open image file: {}",
                path.to_string_lossy().red().bold()
            )
        })?;

    let image = reader.decode().with_context(|| {
        format!(
            "Unable to decode image file: {}",
            path.to_string_lossy().red().bold()
        )
    })?;

    Ok(image.to_rgba8())
}

/// 根据输出文件的扩展名选择编码格式，未知或不可写的格式回退到 PNG。
pub fn output_format(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path)
        .ok()
        .filter(|format| format.writing_enabled())
        .unwrap_or(ImageFormat::Png)
}

/// 在读取任何输入之前检查输出路径：不覆盖已有文件 (除非 `force`)，且父目录必须存在。
fn check_output(output: &Path, force: bool) -> Result<()> {
    anyhow::ensure!(
        force || !output.exists(),
        "Output file already exists: {}\nUse --force to overwrite it.",
        output.to_string_lossy().red().bold()
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        anyhow::ensure!(
            parent.is_dir(),
            "Unable to create output file: {}\nThe directory {} does not exist.",
            output.to_string_lossy().red().bold(),
            parent.to_string_lossy().red().bold()
        );
    }

    Ok(())
}

/// 执行一次嵌入或揭示。
///
/// 负责检查输出路径、读取并解码输入图像、按分块并行地执行像素变换，
/// 最后把结果编码写入输出文件。只有在所有分块都成功后才会创建输出文件。
///
/// # Arguments
///
/// * `invocation` - 规整后的命令行请求。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 输出文件已存在且未指定 `--force`，或输出目录不存在。
/// * 无法打开或解码任一输入图像。
/// * 嵌入时载体与隐藏图像尺寸不同。
/// * 任一分块任务失败。
/// * 无法写入输出图像。
pub fn handle(invocation: Invocation) -> Result<()> {
    check_output(&invocation.output, invocation.force)?;

    let carrier = load_image(&invocation.carrier)?;
    let hidden = invocation
        .hidden
        .as_deref()
        .map(load_image)
        .transpose()?;

    let job = match (invocation.mode, hidden.as_ref()) {
        (Mode::Embed, Some(hidden)) => Job::Embed {
            carrier: &carrier,
            hidden,
        },
        (Mode::Embed, None) => anyhow::bail!("Embedding requires a hidden image"),
        (Mode::Reveal, _) => Job::Reveal { image: &carrier },
    };

    let scheduler = Scheduler::new(invocation.threads);
    let (output, report) = scheduler
        .run(job, invocation.depth)
        .with_context(|| match invocation.mode {
            Mode::Embed => "Failed to embed the hidden image into the carrier.",
            Mode::Reveal => "Failed to reveal the low bits of the image.",
        })?;

    let format = output_format(&invocation.output);
    debug!("encoding {} as {:?}", invocation.output.display(), format);

    output
        .save_with_format(&invocation.output, format)
        .with_context(|| {
            format!(
                "Unable to write to output image file: {}",
                invocation.output.to_string_lossy().red().bold()
            )
        })?;

    if !invocation.quiet {
        let bits = invocation.depth.get().to_string();
        match invocation.mode {
            Mode::Embed => println!(
                "Placed {} into the lower {} bits of {} and saved the result: {}",
                invocation
                    .hidden
                    .as_deref()
                    .unwrap_or(Path::new(""))
                    .to_string_lossy()
                    .green()
                    .bold(),
                bits.green().bold(),
                invocation.carrier.to_string_lossy().green().bold(),
                invocation.output.to_string_lossy().green().bold()
            ),
            Mode::Reveal => println!(
                "Normalized the lower {} bits of {} and saved the result: {}",
                bits.green().bold(),
                invocation.carrier.to_string_lossy().green().bold(),
                invocation.output.to_string_lossy().green().bold()
            ),
        }
        println!(
            "{} blocks on {} threads: {}ms",
            report.blocks,
            report.threads,
            format!("{:.3}", report.elapsed.as_secs_f64() * 1000.0).cyan()
        );
    }

    Ok(())
}
